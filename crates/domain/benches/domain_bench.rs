use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    InMemoryOrderStore, Money, Order, OrderId, OrderLine, OrderService, ProductId, SkuId, UserId,
};

fn make_order(id: u64) -> Order {
    Order::builder()
        .order_id(OrderId::new(format!("SN-BENCH-{id}")))
        .user_id(UserId::new(1))
        .lines((1..=5).map(|sku| OrderLine {
            sku_id: SkuId::new(sku),
            product_id: ProductId::new(sku),
            product_name: "Benchmark Widget".to_string(),
            sku_specs: String::new(),
            price: Money::from_cents(1000),
            quantity: 1,
        }))
        .build()
        .unwrap()
}

fn bench_build_order(c: &mut Criterion) {
    c.bench_function("domain/build_order_5_lines", |b| {
        b.iter(|| make_order(0));
    });
}

fn bench_create_and_pay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryOrderStore::new());
    let mut next = 0u64;

    c.bench_function("domain/create_and_pay", |b| {
        b.iter(|| {
            next += 1;
            let order = make_order(next);
            rt.block_on(async {
                service.create_order(&order).await.unwrap();
                service.mark_paid(order.id()).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_build_order, bench_create_and_pay);
criterion_main!(benches);
