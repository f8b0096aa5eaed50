//! Integration tests for the analytics components over enriched fixtures.

mod common;

use commerce_etl::aggregators::{
    CustomerAnalytics, InventoryAnalytics, OrderLifecycle, ProductAnalytics, ReviewAnalytics,
    SalesAnalytics,
};
use commerce_etl::context::EtlContext;
use commerce_etl::dataset::Dataset;
use commerce_etl::enrichers::{
    Enricher, InventoryCatalogs, InventoryEnricher, OrdersCatalogs, OrdersEnricher,
    ReviewsCatalogs, ReviewsEnricher,
};
use commerce_etl::logging::EtlLogger;
use common::*;

fn ctx() -> EtlContext {
    EtlContext::default()
}

fn logger() -> EtlLogger {
    EtlLogger::transformation()
}

fn labels(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|v| Some(v.to_string())).collect()
}

fn assert_floats(actual: Vec<Option<f64>>, expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!(approx(a.unwrap(), *e), "{actual:?} vs {expected:?}");
    }
}

async fn enriched_orders() -> Dataset {
    let catalogs = OrdersCatalogs {
        customers: customers(),
        promotions: promotions(),
        order_items: order_items(),
    };
    OrdersEnricher::with_default_cleaner(ctx(), logger())
        .enrich(&orders(), &catalogs)
        .await
        .unwrap()
}

async fn enriched_inventory() -> Dataset {
    let catalogs = InventoryCatalogs {
        products: products(),
        warehouses: warehouses(),
    };
    InventoryEnricher::with_default_cleaner(ctx(), logger())
        .enrich(&inventory(), &catalogs)
        .await
        .unwrap()
}

async fn enriched_reviews() -> Dataset {
    let catalogs = ReviewsCatalogs {
        products: products(),
        customers: customers(),
    };
    ReviewsEnricher::with_default_cleaner(ctx(), logger())
        .enrich(&reviews(), &catalogs)
        .await
        .unwrap()
}

mod customers {
    use super::*;

    #[tokio::test]
    async fn test_top_spenders_above_percentile() {
        let orders = enriched_orders().await;
        let analytics = CustomerAnalytics::new(ctx(), logger());

        // Spend: 100 -> 300, 101 -> 60, 102 -> 80, 103 -> 300.
        let top = analytics.top_spenders(&orders, 5, 0.8).await.unwrap();
        assert_eq!(ints(&top, "customer_id"), vec![Some(100), Some(103)]);
        assert_floats(floats(&top, "total_spent"), &[300.0, 300.0]);
        assert_eq!(ints(&top, "order_count"), vec![Some(2), Some(1)]);

        let everyone = analytics.top_spenders(&orders, 3, 0.0).await.unwrap();
        assert_eq!(
            ints(&everyone, "customer_id"),
            vec![Some(100), Some(103), Some(102)]
        );
    }

    #[tokio::test]
    async fn test_top_spenders_rejects_invalid_percentile() {
        let orders = enriched_orders().await;
        let err = CustomerAnalytics::new(ctx(), logger())
            .top_spenders(&orders, 5, 1.5)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[tokio::test]
    async fn test_recurring_customers_and_average_ticket() {
        let orders = enriched_orders().await;
        let analytics = CustomerAnalytics::new(ctx(), logger());

        let recurring = analytics.recurring_customers(&orders, 2).await.unwrap();
        assert_eq!(ints(&recurring, "customer_id"), vec![Some(100)]);
        assert_eq!(ints(&recurring, "order_count"), vec![Some(2)]);

        let average = analytics.average_ticket_overall(&orders).await.unwrap();
        assert!(approx(average, 148.0));
    }
}

mod products {
    use super::*;

    #[tokio::test]
    async fn test_top_products_by_quantity() {
        let analytics = ProductAnalytics::new(ctx(), logger());
        let top = analytics
            .top_products_by_quantity(&order_items(), &common::products(), 10)
            .await
            .unwrap();

        assert_eq!(ints(&top, "product_id"), vec![Some(10), Some(12), Some(11)]);
        assert_eq!(ints(&top, "total_quantity"), vec![Some(5), Some(4), Some(3)]);
        assert_eq!(strings(&top, "product_name"), labels(&["Widget", "Gizmo", "Gadget"]));

        let top_one = analytics
            .top_products_by_quantity(&order_items(), &common::products(), 1)
            .await
            .unwrap();
        assert_eq!(ints(&top_one, "product_id"), vec![Some(10)]);
    }

    #[tokio::test]
    async fn test_unknown_product_keeps_null_name() {
        let analytics = ProductAnalytics::new(ctx(), logger());
        let top = analytics
            .top_products_by_quantity(&order_items(), &common::products().head(1), 10)
            .await
            .unwrap();

        assert_eq!(top.num_rows(), 3);
        assert_eq!(nulls(&top, "product_name"), 2);
    }
}

mod sales {
    use super::*;

    #[tokio::test]
    async fn test_monthly_sales_sorted_chronologically() {
        let orders = enriched_orders().await;
        let analytics = SalesAnalytics::new(ctx(), logger());

        let monthly = analytics.monthly_sales(&orders).await.unwrap();
        assert_eq!(
            strings(&monthly, "order_month"),
            labels(&["2024-01", "2024-02", "2024-03"])
        );
        assert_floats(floats(&monthly, "revenue"), &[160.0, 280.0, 300.0]);
        assert_eq!(ints(&monthly, "order_count"), vec![Some(2), Some(2), Some(1)]);

        let rate = analytics.promotion_usage_rate(&orders).await.unwrap();
        assert!(approx(rate, 0.4));
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_status_funnel_orders_by_count_then_status() {
        let orders = enriched_orders().await;
        let funnel = OrderLifecycle::new(ctx(), logger())
            .status_funnel(&orders)
            .await
            .unwrap();

        assert_eq!(
            strings(&funnel, "status"),
            labels(&["delivered", "cancelled", "processing", "shipped"])
        );
        assert_eq!(
            ints(&funnel, "orders"),
            vec![Some(2), Some(1), Some(1), Some(1)]
        );
        assert_floats(floats(&funnel, "share"), &[0.4, 0.2, 0.2, 0.2]);
    }

    #[tokio::test]
    async fn test_terminal_rates_and_backlog() {
        let orders = enriched_orders().await;
        let lifecycle = OrderLifecycle::new(ctx(), logger());

        assert!(approx(lifecycle.cancellation_rate(&orders).await.unwrap(), 0.2));
        assert!(approx(lifecycle.delivery_rate(&orders).await.unwrap(), 0.4));

        let backlog = lifecycle.in_progress_backlog(&orders).await.unwrap();
        assert_eq!(strings(&backlog, "order_month"), labels(&["2024-01", "2024-02"]));
        assert_eq!(ints(&backlog, "backlog_orders"), vec![Some(1), Some(1)]);
        assert_floats(floats(&backlog, "backlog_value"), &[60.0, 200.0]);
    }
}

mod inventory {
    use super::*;

    #[tokio::test]
    async fn test_stock_health_summary() {
        let inventory = enriched_inventory().await;
        let summary = InventoryAnalytics::new(ctx(), logger())
            .stock_health_summary(&inventory)
            .await
            .unwrap();

        assert_eq!(summary.num_rows(), 1);
        assert_eq!(ints(&summary, "total_records"), vec![Some(5)]);
        assert_eq!(ints(&summary, "low_stock"), vec![Some(3)]);
        assert_eq!(ints(&summary, "overstock"), vec![Some(1)]);
        assert_eq!(ints(&summary, "healthy"), vec![Some(1)]);
    }

    #[tokio::test]
    async fn test_low_stock_items_most_critical_first() {
        let inventory = enriched_inventory().await;
        let analytics = InventoryAnalytics::new(ctx(), logger());

        let items = analytics.low_stock_items(&inventory, 20).await.unwrap();
        assert_eq!(ints(&items, "inventory_id"), vec![Some(4), Some(1), Some(5)]);
        assert_eq!(ints(&items, "stock_deficit"), vec![Some(20), Some(5), Some(0)]);
        assert_eq!(
            strings(&items, "product_name"),
            labels(&["Doohickey", "Widget", "Widget"])
        );

        let top_two = analytics.low_stock_items(&inventory, 2).await.unwrap();
        assert_eq!(top_two.num_rows(), 2);
    }

    #[tokio::test]
    async fn test_warehouse_utilization() {
        let inventory = enriched_inventory().await;
        let utilization = InventoryAnalytics::new(ctx(), logger())
            .warehouse_utilization(&inventory)
            .await
            .unwrap();

        assert_eq!(
            ints(&utilization, "warehouse_id"),
            vec![Some(1), Some(2), Some(3)]
        );
        assert_floats(floats(&utilization, "occupancy_ratio"), &[0.8, 0.2, 0.0]);
        assert_eq!(
            ints(&utilization, "inventory_records"),
            vec![Some(2), Some(2), Some(1)]
        );
        assert_eq!(
            ints(&utilization, "total_quantity"),
            vec![Some(155), Some(50), Some(10)]
        );
    }
}

mod reviews {
    use super::*;

    #[tokio::test]
    async fn test_rating_overview() {
        let reviews = enriched_reviews().await;
        let overview = ReviewAnalytics::new(ctx(), logger())
            .rating_overview(&reviews)
            .await
            .unwrap();

        assert_floats(floats(&overview, "average_rating"), &[20.0 / 6.0]);
        assert_floats(floats(&overview, "positive_rate"), &[0.5]);
        assert_floats(floats(&overview, "negative_rate"), &[2.0 / 6.0]);
        assert_eq!(ints(&overview, "review_count"), vec![Some(6)]);
    }

    #[tokio::test]
    async fn test_rating_by_product_filters_and_ranks() {
        let reviews = enriched_reviews().await;
        let analytics = ReviewAnalytics::new(ctx(), logger());

        let popular = analytics.rating_by_product(&reviews, 3, 20).await.unwrap();
        assert_eq!(ints(&popular, "product_id"), vec![Some(10)]);
        assert_floats(floats(&popular, "average_rating"), &[11.0 / 3.0]);
        assert_floats(floats(&popular, "positive_rate"), &[2.0 / 3.0]);

        // Products 11 and 12 tie on rating; more reviews rank first.
        let ranked = analytics.rating_by_product(&reviews, 1, 20).await.unwrap();
        assert_eq!(
            ints(&ranked, "product_id"),
            vec![Some(10), Some(11), Some(12)]
        );
        assert_eq!(
            ints(&ranked, "review_count"),
            vec![Some(3), Some(2), Some(1)]
        );
    }

    #[tokio::test]
    async fn test_highly_rated_product_below_minimum_is_excluded() {
        // Product 13 has a single five-star review.
        let raw = Dataset::try_from_columns(
            "reviews",
            vec![
                ("review_id", int(vec![Some(1), Some(2), Some(3), Some(4)])),
                ("product_id", int(vec![Some(10), Some(10), Some(10), Some(13)])),
                ("customer_id", int(vec![Some(100), Some(101), Some(102), Some(100)])),
                ("rating", int(vec![Some(3), Some(4), Some(3), Some(5)])),
                ("created_at", text(vec![Some("2024-04-01"); 4])),
            ],
        )
        .unwrap();
        let catalogs = ReviewsCatalogs {
            products: products(),
            customers: customers(),
        };
        let reviews = ReviewsEnricher::with_default_cleaner(ctx(), logger())
            .enrich(&raw, &catalogs)
            .await
            .unwrap();

        let ranked = ReviewAnalytics::new(ctx(), logger())
            .rating_by_product(&reviews, 3, 20)
            .await
            .unwrap();
        assert_eq!(ints(&ranked, "product_id"), vec![Some(10)]);
        assert_floats(floats(&ranked, "average_rating"), &[10.0 / 3.0]);
    }

    #[tokio::test]
    async fn test_monthly_review_volume() {
        let reviews = enriched_reviews().await;
        let monthly = ReviewAnalytics::new(ctx(), logger())
            .monthly_review_volume(&reviews)
            .await
            .unwrap();

        assert_eq!(
            strings(&monthly, "review_month"),
            labels(&["2024-01", "2024-02", "2024-03"])
        );
        assert_eq!(ints(&monthly, "volume"), vec![Some(2), Some(3), Some(1)]);
        assert_floats(floats(&monthly, "average_rating"), &[4.5, 8.0 / 3.0, 3.0]);
    }
}

mod edge_cases {
    use super::*;

    #[tokio::test]
    async fn test_empty_tables_give_empty_or_zero_results() {
        let orders = enriched_orders().await.head(0);
        let inventory = enriched_inventory().await.head(0);
        let reviews = enriched_reviews().await.head(0);

        let customers = CustomerAnalytics::new(ctx(), logger());
        assert_eq!(customers.top_spenders(&orders, 5, 0.8).await.unwrap().num_rows(), 0);
        assert_eq!(customers.recurring_customers(&orders, 2).await.unwrap().num_rows(), 0);
        assert_eq!(customers.average_ticket_overall(&orders).await.unwrap(), 0.0);

        let sales = SalesAnalytics::new(ctx(), logger());
        assert_eq!(sales.monthly_sales(&orders).await.unwrap().num_rows(), 0);
        assert_eq!(sales.promotion_usage_rate(&orders).await.unwrap(), 0.0);

        let lifecycle = OrderLifecycle::new(ctx(), logger());
        assert_eq!(lifecycle.status_funnel(&orders).await.unwrap().num_rows(), 0);
        assert_eq!(lifecycle.cancellation_rate(&orders).await.unwrap(), 0.0);
        assert_eq!(lifecycle.delivery_rate(&orders).await.unwrap(), 0.0);
        assert_eq!(lifecycle.in_progress_backlog(&orders).await.unwrap().num_rows(), 0);

        let stock = InventoryAnalytics::new(ctx(), logger());
        let summary = stock.stock_health_summary(&inventory).await.unwrap();
        assert_eq!(ints(&summary, "total_records"), vec![Some(0)]);
        assert_eq!(ints(&summary, "healthy"), vec![Some(0)]);
        assert_eq!(stock.low_stock_items(&inventory, 5).await.unwrap().num_rows(), 0);
        assert_eq!(stock.warehouse_utilization(&inventory).await.unwrap().num_rows(), 0);

        let ratings = ReviewAnalytics::new(ctx(), logger());
        let overview = ratings.rating_overview(&reviews).await.unwrap();
        assert_eq!(floats(&overview, "average_rating"), vec![Some(0.0)]);
        assert_eq!(ints(&overview, "review_count"), vec![Some(0)]);
        assert_eq!(ratings.rating_by_product(&reviews, 1, 5).await.unwrap().num_rows(), 0);
        assert_eq!(ratings.monthly_review_volume(&reviews).await.unwrap().num_rows(), 0);
    }

    #[tokio::test]
    async fn test_missing_grouping_column_fails_before_query() {
        let orders = enriched_orders().await.without_column("order_month").unwrap();
        let err = SalesAnalytics::new(ctx(), logger())
            .monthly_sales(&orders)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MissingRequiredColumnsError");
        assert!(err.to_string().contains("order_month"));

        let inventory = enriched_inventory().await.without_column("is_low_stock").unwrap();
        let err = InventoryAnalytics::new(ctx(), logger())
            .stock_health_summary(&inventory)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MissingRequiredColumnsError");
    }

    #[tokio::test]
    async fn test_aggregators_do_not_modify_input() {
        let orders = enriched_orders().await;
        let before = orders.batch().clone();

        let lifecycle = OrderLifecycle::new(ctx(), logger());
        lifecycle.status_funnel(&orders).await.unwrap();
        lifecycle.in_progress_backlog(&orders).await.unwrap();
        CustomerAnalytics::new(ctx(), logger())
            .top_spenders(&orders, 5, 0.8)
            .await
            .unwrap();

        assert_eq!(orders.batch(), &before);
    }
}
