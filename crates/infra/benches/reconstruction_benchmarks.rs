use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use hotelstock_core::{DepartmentId, HotelId};
use hotelstock_infra::{InMemoryLedgerStore, LedgerStore};
use hotelstock_ledger::{
    daily_balances, stock_report_row, Actor, AddStock, ItemDetails, ItemTransaction, LocationIndex, MarkDamage,
    ReportWindow, StockItem, TransferStock,
};

/// A year of activity on one location: adds, damages and transfers out,
/// spread evenly over 2024.
fn seeded_log(count: usize) -> (StockItem, Vec<ItemTransaction>, LocationIndex) {
    let (hotel, kitchen, bar) = (HotelId::new(), DepartmentId::new(), DepartmentId::new());
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let step = Duration::minutes((366 * 24 * 60 / count.max(1)) as i64);

    let mut index = LocationIndex::new();
    let mut log = Vec::with_capacity(count + 1);
    let mut destination: Option<StockItem> = None;

    let mut item = {
        let commit = AddStock {
            name: "Rice".into(),
            hotel_id: hotel,
            department_id: kitchen,
            quantity: 1_000_000,
            details: ItemDetails::default(),
            actor: Actor::system(),
            occurred_at: start,
        }
        .decide(None)
        .unwrap();
        log.extend(commit.transactions);
        commit.writes[0].item.clone()
    };

    for i in 0..count {
        let at = start + step * i as i32;
        match i % 3 {
            0 => {
                let commit = AddStock {
                    name: "Rice".into(),
                    hotel_id: hotel,
                    department_id: kitchen,
                    quantity: 5,
                    details: ItemDetails::default(),
                    actor: Actor::system(),
                    occurred_at: at,
                }
                .decide(Some(&item))
                .unwrap();
                item = commit.writes[0].item.clone();
                log.extend(commit.transactions);
            }
            1 => {
                let commit = MarkDamage {
                    item_id: item.id,
                    quantity: 1,
                    remarks: None,
                    actor: Actor::system(),
                    occurred_at: at,
                }
                .decide(&item)
                .unwrap();
                item = commit.writes[0].item.clone();
                log.extend(commit.transactions);
            }
            _ => {
                let decision = TransferStock {
                    item_id: item.id,
                    to_hotel_id: None,
                    to_department_id: Some(bar),
                    quantity: 2,
                    remarks: None,
                    actor: Actor::system(),
                    occurred_at: at,
                }
                .decide(&item, destination.as_ref())
                .unwrap();
                item = decision.source;
                destination = Some(decision.destination);
                log.extend(decision.commit.transactions);
            }
        }
    }

    index.insert_item(&item);
    if let Some(d) = &destination {
        index.insert_item(d);
    }
    (item, log, index)
}

fn year_window() -> ReportWindow {
    ReportWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        FixedOffset::east_opt(0).unwrap(),
    )
    .unwrap()
}

fn bench_stock_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_report_row");

    for count in [100, 1_000, 10_000, 100_000].iter() {
        let (item, log, index) = seeded_log(*count);
        let window = year_window();
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("replay", count), count, |b, _| {
            b.iter(|| black_box(stock_report_row(&item, &log, &window, &index)));
        });
    }

    group.finish();
}

fn bench_daily_balances(c: &mut Criterion) {
    let mut group = c.benchmark_group("daily_balances");

    for count in [1_000, 10_000, 100_000].iter() {
        let (item, log, index) = seeded_log(*count);
        let window = year_window();
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("year_walk", count), count, |b, _| {
            b.iter(|| black_box(daily_balances(&item, &log, &window, &index)));
        });
    }

    group.finish();
}

fn bench_commit_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let mut group = c.benchmark_group("in_memory_commit");
    group.throughput(Throughput::Elements(1));

    group.bench_function("mark_damage", |b| {
        let store = InMemoryLedgerStore::new();
        let commit = AddStock {
            name: "Rice".into(),
            hotel_id: HotelId::new(),
            department_id: DepartmentId::new(),
            quantity: i64::MAX / 2,
            details: ItemDetails::default(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        }
        .decide(None)
        .unwrap();
        let mut item = commit.writes[0].item.clone();
        rt.block_on(store.commit(commit)).unwrap();

        b.iter(|| {
            let commit = MarkDamage {
                item_id: item.id,
                quantity: 1,
                remarks: None,
                actor: Actor::system(),
                occurred_at: Utc::now(),
            }
            .decide(&item)
            .unwrap();
            item = commit.writes[0].item.clone();
            rt.block_on(store.commit(black_box(commit))).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_stock_report,
    bench_daily_balances,
    bench_commit_throughput
);
criterion_main!(benches);
