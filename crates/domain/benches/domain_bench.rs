use common::{LineId, OrderId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{ColorId, Money, OrderLine, ProductId, SizeId};

fn make_lines(order: &OrderId, n: u32) -> Vec<OrderLine> {
    (0..n)
        .map(|i| OrderLine {
            id: LineId::generate(),
            order: order.clone(),
            product: ProductId::new(format!("P{i:03}")),
            color: ColorId::new("C01"),
            size: SizeId::new("M"),
            quantity: (i % 5) + 1,
            unit_price: Money::from_cents(1000 + i64::from(i)),
        })
        .collect()
}

fn bench_total_from_lines(c: &mut Criterion) {
    let order = OrderId::generate();
    let lines = make_lines(&order, 32);

    c.bench_function("domain/total_from_lines", |b| {
        b.iter(|| {
            let total: Money = lines.iter().map(OrderLine::subtotal).sum();
            total
        });
    });
}

fn bench_id_generation(c: &mut Criterion) {
    c.bench_function("domain/order_id_generate", |b| {
        b.iter(OrderId::generate);
    });
}

criterion_group!(benches, bench_total_from_lines, bench_id_generation);
criterion_main!(benches);
