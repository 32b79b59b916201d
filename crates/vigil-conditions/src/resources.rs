//! Localized message tables.
//!
//! A [`ResourceTable`] maps message templates to localized text, one map per
//! locale. Condition types built against a table look their template up on
//! every message read, so switching the table's locale changes the messages
//! of every type that uses it.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Locale used when a table is created without one.
pub const DEFAULT_LOCALE: &str = "en";

/// Message templates keyed by locale, then by template text.
pub struct ResourceTable {
    name: String,
    default_locale: String,
    locale: RwLock<String>,
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl ResourceTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_default_locale(name, DEFAULT_LOCALE)
    }

    /// Create a table whose fallback locale is `locale`.
    pub fn with_default_locale(name: impl Into<String>, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        Self {
            name: name.into(),
            locale: RwLock::new(locale.clone()),
            default_locale: locale,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Add an entry (builder pattern).
    pub fn with_entry(
        self,
        locale: impl Into<String>,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.insert(locale, key, text);
        self
    }

    pub fn insert(&self, locale: impl Into<String>, key: impl Into<String>, text: impl Into<String>) {
        self.entries
            .write()
            .entry(locale.into())
            .or_default()
            .insert(key.into(), text.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The locale lookups currently resolve against.
    pub fn locale(&self) -> String {
        self.locale.read().clone()
    }

    pub fn set_locale(&self, locale: impl Into<String>) {
        *self.locale.write() = locale.into();
    }

    /// Look up `key` in the current locale, then in the default locale.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let locale = self.locale.read();
        let entries = self.entries.read();
        [locale.as_str(), self.default_locale.as_str()]
            .iter()
            .find_map(|l| entries.get(*l).and_then(|m| m.get(key)))
            .cloned()
    }

    /// Load entries from a document, replacing any with the same key.
    pub fn load(&self, document: &ResourceDocument) {
        for (locale, entries) in &document.entries {
            for (key, text) in entries {
                self.insert(locale.clone(), key.clone(), text.clone());
            }
        }
        if let Some(locale) = &document.locale {
            self.set_locale(locale.clone());
        }
    }
}

impl fmt::Debug for ResourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTable")
            .field("name", &self.name)
            .field("locale", &*self.locale.read())
            .field("locales", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Serialized form of a resource table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDocument {
    pub name: String,
    /// Locale to activate after loading.
    #[serde(default)]
    pub locale: Option<String>,
    /// Model types whose condition types use this table.
    #[serde(default)]
    pub source_types: Vec<String>,
    #[serde(default)]
    pub entries: HashMap<String, HashMap<String, String>>,
}

impl ResourceDocument {
    pub fn to_table(&self) -> ResourceTable {
        let table = ResourceTable::new(self.name.clone());
        table.load(self);
        table
    }
}
