use std::sync::Arc;

use pedidos_catalog::{Catalog, CatalogError, NewProduct, ProductFilter, ProductUpdate};
use pedidos_order::OrderManager;
use pedidos_store::MemoryStore;
use uuid::Uuid;

fn setup() -> (Catalog, OrderManager) {
    let store = Arc::new(MemoryStore::new());
    let catalog = Catalog::new(store.clone());
    let manager = OrderManager::new(store.clone(), store.clone());
    (catalog, manager)
}

fn new_product(name: &str, price_cents: i64, stock: i32) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        description: String::new(),
        price_cents,
        stock,
    }
}

#[tokio::test]
async fn test_create_and_get() {
    let (catalog, _) = setup();
    let created = catalog.create(new_product("Widget", 1500, 10)).await.unwrap();

    let fetched = catalog.get(created.id).await.unwrap();
    assert_eq!(fetched.name, "Widget");
    assert_eq!(fetched.price_cents, 1500);
    assert_eq!(fetched.stock, 10);
}

#[tokio::test]
async fn test_get_unknown_product() {
    let (catalog, _) = setup();
    assert!(matches!(
        catalog.get(Uuid::new_v4()).await.unwrap_err(),
        CatalogError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_duplicate_names_rejected_case_insensitive() {
    let (catalog, _) = setup();
    catalog.create(new_product("Widget", 1000, 1)).await.unwrap();

    let err = catalog.create(new_product("WIDGET", 2000, 5)).await.unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateName(_)));
}

#[tokio::test]
async fn test_create_validation() {
    let (catalog, _) = setup();

    assert!(matches!(
        catalog.create(new_product("  ", 1000, 1)).await.unwrap_err(),
        CatalogError::Validation(_)
    ));
    assert!(matches!(
        catalog.create(new_product("Widget", 0, 1)).await.unwrap_err(),
        CatalogError::Validation(_)
    ));
    assert!(matches!(
        catalog.create(new_product("Widget", 1000, -1)).await.unwrap_err(),
        CatalogError::Validation(_)
    ));
}

#[tokio::test]
async fn test_update_edits_fields_but_not_stock() {
    let (catalog, manager) = setup();
    let product = catalog.create(new_product("Widget", 1000, 10)).await.unwrap();

    // Move some stock through the order flow first
    manager.add_to_cart("alice", product.id, 4).await.unwrap();
    manager.confirm("alice").await.unwrap();

    let updated = catalog
        .update(
            product.id,
            ProductUpdate {
                name: "Premium Widget".to_string(),
                description: "Now premium".to_string(),
                price_cents: 2500,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Premium Widget");
    assert_eq!(updated.price_cents, 2500);

    // The live counter kept the ledger's value
    assert_eq!(catalog.get(product.id).await.unwrap().stock, 6);
}

#[tokio::test]
async fn test_update_rejects_name_clash_but_allows_own_name() {
    let (catalog, _) = setup();
    let widget = catalog.create(new_product("Widget", 1000, 1)).await.unwrap();
    catalog.create(new_product("Gadget", 1000, 1)).await.unwrap();

    let err = catalog
        .update(
            widget.id,
            ProductUpdate {
                name: "gadget".to_string(),
                description: String::new(),
                price_cents: 1000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateName(_)));

    // Re-saving under its own name is fine
    catalog
        .update(
            widget.id,
            ProductUpdate {
                name: "Widget".to_string(),
                description: "refreshed".to_string(),
                price_cents: 1200,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_guards() {
    let (catalog, manager) = setup();
    let product = catalog.create(new_product("Widget", 1000, 10)).await.unwrap();

    assert!(matches!(
        catalog.delete(Uuid::new_v4()).await.unwrap_err(),
        CatalogError::NotFound(_)
    ));

    // A cart line is already enough to block deletion
    let cart = manager.add_to_cart("alice", product.id, 1).await.unwrap();
    assert!(matches!(
        catalog.delete(product.id).await.unwrap_err(),
        CatalogError::InUse(_)
    ));

    // Gone order, gone reference
    manager.delete_order(cart.id).await.unwrap();
    catalog.delete(product.id).await.unwrap();
    assert!(matches!(
        catalog.get(product.id).await.unwrap_err(),
        CatalogError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_list_filters() {
    let (catalog, _) = setup();
    catalog
        .create(NewProduct {
            name: "Blue Widget".to_string(),
            description: "A widget, blue".to_string(),
            price_cents: 1000,
            stock: 5,
        })
        .await
        .unwrap();
    catalog
        .create(NewProduct {
            name: "Gadget".to_string(),
            description: "Handy gadget".to_string(),
            price_cents: 3000,
            stock: 0,
        })
        .await
        .unwrap();

    let all = catalog.list(&ProductFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    // Matches against the description as well as the name
    let widgets = catalog
        .list(&ProductFilter {
            name_contains: Some("blue".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].name, "Blue Widget");

    let pricey = catalog
        .list(&ProductFilter {
            min_price_cents: Some(2000),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pricey.len(), 1);
    assert_eq!(pricey[0].name, "Gadget");

    let available = catalog
        .list(&ProductFilter {
            in_stock_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].name, "Blue Widget");
}
