//! Distributed Execution Tests
//!
//! End to end over an in-process cluster:
//! - Partial aggregation on shards, merged on the node and the cluster,
//!   matches a single-pass aggregation
//! - Results do not depend on how rows are spread over nodes and shards
//! - A failing producer fails the job with its message

use std::sync::Arc;

use gridsql::config::EngineConfig;
use gridsql::distributed::{ExecutionPlan, LocalCluster};
use gridsql::executor::ProjectorFactory;
use gridsql::functions::FunctionRegistry;
use gridsql::projection::{
    AggregateStep, Aggregation, AggregationProjection, FilterProjection, GroupProjection,
    OrderBy, OrderProjection, Projection, RowGranularity,
};
use gridsql::row::{Bucket, Row};
use gridsql::symbol::{FunctionInfo, Symbol};
use gridsql::types::{DataType, Value};
use gridsql::EngineError;

// =============================================================================
// Test Utilities
// =============================================================================

fn registry() -> Arc<FunctionRegistry> {
    Arc::new(FunctionRegistry::new())
}

fn cluster(rows_per_request: usize) -> LocalCluster {
    let config = EngineConfig {
        rows_per_request,
        max_concurrent_shards: 2,
        ..EngineConfig::default()
    };
    LocalCluster::new(config, Arc::new(ProjectorFactory::new(registry()))).unwrap()
}

fn aggregate(name: &str) -> FunctionInfo {
    registry().aggregate_info(name, &[DataType::Long]).unwrap()
}

fn state_ref(index: u32) -> Symbol {
    Symbol::reference(index, DataType::AggregationState)
}

/// `SELECT city, sum(amount), variance(amount) GROUP BY city ORDER BY city`
/// as shard partial, node partial merge, cluster final merge
fn grouped_plan() -> ExecutionPlan {
    let city = Symbol::reference(0, DataType::String);
    let amount = Symbol::reference(1, DataType::Long);
    let step = |name: &str, input: Symbol, from, to| {
        Aggregation::new(aggregate(name), vec![input], from, to)
    };

    ExecutionPlan {
        input_types: vec![DataType::String, DataType::Long],
        shard_projections: vec![Projection::Group(GroupProjection::new(
            vec![city.clone()],
            vec![
                step("sum", amount.clone(), AggregateStep::Iter, AggregateStep::Partial),
                step("variance", amount, AggregateStep::Iter, AggregateStep::Partial),
            ],
            RowGranularity::Shard,
        ))],
        node_projections: vec![Projection::Group(GroupProjection::new(
            vec![city.clone()],
            vec![
                step("sum", state_ref(1), AggregateStep::Partial, AggregateStep::Partial),
                step("variance", state_ref(2), AggregateStep::Partial, AggregateStep::Partial),
            ],
            RowGranularity::Node,
        ))],
        merge_projections: vec![
            Projection::Group(GroupProjection::new(
                vec![city.clone()],
                vec![
                    step("sum", state_ref(1), AggregateStep::Partial, AggregateStep::Final),
                    step("variance", state_ref(2), AggregateStep::Partial, AggregateStep::Final),
                ],
                RowGranularity::Cluster,
            )),
            Projection::Order(OrderProjection::new(
                vec![
                    city.clone(),
                    Symbol::reference(1, DataType::Long),
                    Symbol::reference(2, DataType::Double),
                ],
                vec![OrderBy::asc(city)],
            )),
        ],
    }
}

fn sale(city: &str, amount: i64) -> Row {
    vec![Value::from(city), Value::Long(amount)]
}

fn all_sales() -> Vec<Row> {
    vec![
        sale("oslo", 7),
        sale("rome", 2),
        sale("oslo", 3),
        sale("lima", 9),
        sale("rome", 4),
        vec![Value::from("lima"), Value::Null],
        sale("rome", 6),
    ]
}

/// Deals rows round robin onto `nodes` nodes of `shards` shards each
fn spread(rows: Vec<Row>, nodes: usize, shards: usize) -> Vec<Vec<Bucket>> {
    let mut layout: Vec<Vec<Vec<Row>>> = vec![vec![Vec::new(); shards]; nodes];
    for (i, row) in rows.into_iter().enumerate() {
        layout[i % nodes][(i / nodes) % shards].push(row);
    }
    layout
        .into_iter()
        .map(|node| node.into_iter().map(Bucket::materialized).collect())
        .collect()
}

fn expected_grouped() -> Vec<Row> {
    vec![
        vec![Value::from("lima"), Value::Long(9), Value::Double(0.0)],
        vec![Value::from("oslo"), Value::Long(10), Value::Double(4.0)],
        vec![
            Value::from("rome"),
            Value::Long(12),
            Value::Double(8.0 / 3.0),
        ],
    ]
}

fn assert_grouped(rows: &[Row]) {
    let expected = expected_grouped();
    assert_eq!(rows.len(), expected.len());
    for (row, want) in rows.iter().zip(&expected) {
        assert_eq!(row[0], want[0]);
        assert_eq!(row[1], want[1]);
        match (&row[2], &want[2]) {
            (Value::Double(a), Value::Double(b)) => assert!((a - b).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
    }
}

// =============================================================================
// Aggregation across nodes
// =============================================================================

#[tokio::test]
async fn test_grouped_aggregation_over_nodes() {
    let cluster = cluster(1_000);
    let rows = cluster
        .run(&grouped_plan(), spread(all_sales(), 3, 2))
        .await
        .unwrap();
    assert_grouped(&rows);

    let metrics = cluster.metrics().snapshot();
    assert_eq!(metrics.requests_sent, 3);
    assert_eq!(metrics.jobs_completed, 1);
}

#[tokio::test]
async fn test_layout_does_not_change_result() {
    let cluster = cluster(1);
    for (nodes, shards) in [(1, 1), (1, 4), (2, 3), (7, 1), (4, 4)] {
        let rows = cluster
            .run(&grouped_plan(), spread(all_sales(), nodes, shards))
            .await
            .unwrap();
        assert_grouped(&rows);
    }
}

#[tokio::test]
async fn test_global_count_over_empty_nodes() {
    let count = registry().aggregate_info("count", &[]).unwrap();
    let plan = ExecutionPlan {
        input_types: vec![DataType::Long],
        shard_projections: vec![Projection::Aggregation(AggregationProjection::new(
            vec![Aggregation::new(
                count.clone(),
                vec![],
                AggregateStep::Iter,
                AggregateStep::Partial,
            )],
            RowGranularity::Shard,
        ))],
        node_projections: vec![],
        merge_projections: vec![Projection::Aggregation(AggregationProjection::new(
            vec![Aggregation::new(
                count,
                vec![state_ref(0)],
                AggregateStep::Partial,
                AggregateStep::Final,
            )],
            RowGranularity::Cluster,
        ))],
    };

    let nodes = vec![
        vec![Bucket::empty()],
        vec![],
        vec![vec![vec![Value::Long(1)], vec![Value::Null]].into()],
    ];
    let rows = cluster(10).run(&plan, nodes).await.unwrap();
    assert_eq!(rows, vec![vec![Value::Long(2)]]);
}

// =============================================================================
// Failure propagation
// =============================================================================

#[tokio::test]
async fn test_producer_failure_fails_job() {
    let registry = registry();
    let amount = Symbol::reference(0, DataType::Long);
    let divide = registry
        .scalar_info("divide", &[DataType::Long, DataType::Long])
        .unwrap();
    let eq = registry
        .scalar_info("eq", &[DataType::Long, DataType::Long])
        .unwrap();
    let query = Symbol::function(
        eq,
        vec![
            Symbol::function(divide, vec![amount.clone(), Symbol::literal(0i64)]),
            Symbol::literal(1i64),
        ],
    );
    let plan = ExecutionPlan {
        input_types: vec![DataType::Long],
        shard_projections: vec![Projection::Filter(
            FilterProjection::new(query, vec![amount]).with_granularity(RowGranularity::Shard),
        )],
        node_projections: vec![],
        merge_projections: vec![],
    };

    let nodes = vec![
        vec![vec![vec![Value::Long(4)]].into()],
        vec![Bucket::empty()],
    ];
    let err = cluster(10).run(&plan, nodes).await.unwrap_err();
    match err {
        EngineError::Remote(message) => assert!(message.contains("zero"), "{message}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_plan_without_nodes_rejected() {
    let err = cluster(10).run(&grouped_plan(), vec![]).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPlan(_)));
}
