use std::hint::black_box;

use common::{OrderItemId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{NewOrderItem, OrderStatus, quantities_by_product, validate_items};

fn bench_transitions(c: &mut Criterion) {
    let statuses = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Cancelled,
    ];

    c.bench_function("domain/transition_matrix", |b| {
        b.iter(|| {
            for from in statuses {
                for to in statuses {
                    let _ = black_box(from.transition_to(to));
                }
            }
        });
    });
}

fn bench_quantity_aggregation(c: &mut Criterion) {
    let products: Vec<ProductId> = (0..10).map(|_| ProductId::new()).collect();
    let items: Vec<NewOrderItem> = (0..100)
        .map(|i| NewOrderItem {
            id: OrderItemId::new(),
            product_id: products[i % products.len()],
            quantity: (i % 5) as u32 + 1,
        })
        .collect();

    c.bench_function("domain/validate_and_sum_100_items", |b| {
        b.iter(|| {
            validate_items(black_box(&items)).unwrap();
            black_box(quantities_by_product(&items));
        });
    });
}

criterion_group!(benches, bench_transitions, bench_quantity_aggregation);
criterion_main!(benches);
