//! Shared graphs for unit tests.

use vigil_model::{ModelType, NodeId, ObjectGraph, Schema};

/// Orders with line items, each line item pointing at a product.
pub fn order_schema() -> Schema {
    Schema::new()
        .with_type(
            ModelType::new("Order")
                .with_value("Number")
                .with_value("Total")
                .with_value("PromoCode")
                .with_reference("Customer", "Customer")
                .with_reference("Status", "Status")
                .with_list("LineItems", "LineItem"),
        )
        .and_then(|s| {
            s.with_type(
                ModelType::new("LineItem")
                    .with_value("Quantity")
                    .with_reference("Order", "Order")
                    .with_reference("Product", "Product"),
            )
        })
        .and_then(|s| s.with_type(ModelType::new("Product").with_value("Name").with_value("Price")))
        .and_then(|s| s.with_type(ModelType::new("Customer").with_value("FirstName")))
        .and_then(|s| s.with_type(ModelType::new("Status").with_value("Name")))
        .unwrap()
}

/// An order with `items` line items, each with its own product.
pub fn order_graph(items: usize) -> (ObjectGraph, NodeId) {
    let mut graph = ObjectGraph::new(order_schema());
    let order = graph.add_node("Order").unwrap();
    graph.set_value(order, "Number", "A-100").unwrap();
    for _ in 0..items {
        add_item(&mut graph, order);
    }
    (graph, order)
}

/// Add a line item (with a fresh product) to `order`.
pub fn add_item(graph: &mut ObjectGraph, order: NodeId) -> NodeId {
    let product = graph.add_node("Product").unwrap();
    graph.set_value(product, "Name", "Widget").unwrap();
    let item = graph.add_node("LineItem").unwrap();
    graph.set_value(item, "Quantity", 1).unwrap();
    graph.set_reference(item, "Product", Some(product)).unwrap();
    graph.set_reference(item, "Order", Some(order)).unwrap();
    graph.push(order, "LineItems", item).unwrap();
    item
}
