//! CSV 내보내기 → 매퍼 → 병합 통합 테스트

use chrono::{TimeZone, Utc};
use pnl_core::{
    AccountLogMapper, MergeEngine, OrderHistoryMapper, RawTable, Source, SourceMapper,
};
use rust_decimal_macros::dec;

const ACCOUNT_LOG: &str = "\u{feff}uid,dateTime,account,type,symbol,contract,change,new balance,new average entry price,trade price,mark price,funding rate,realized pnl,fee,realized funding,collateral,conversion spread percentage,liquidation fee,position uid,execution
a-3,2024-03-05T16:00:00.000Z,flex,funding rate change,pf_xbtusd,,-0.03,,,,,,,,0,usd,,,,
a-1,2024-03-05T14:22:01.000Z,flex,futures trade,pf_xbtusd,,0.01,0.01,64000,64000.5,,,12.5,-0.5,,usd,,,p-1,e-1
a-2,2024-03-05T15:00:00.000Z,flex,transfer,,,100,1100,,,,,,,,usd,,,,
a-1,2024-03-05T14:22:01.000Z,flex,futures trade,pf_xbtusd,,0.01,0.01,64000,64000.5,,,12.5,-0.5,,usd,,,p-1,e-1
";

const ORDER_HISTORY: &str = "Time;Symbol;Side;Filled;Avg Price;Price;PnL;Fee;Options;Status
05/Mar/2024 13:00:00;PF_ETHUSD;Sell;1;3500,5;3500;\"4,25\";0,5;reduce-only;Filled
05/Mar/2024 13:05:00;PF_ETHUSD;Buy;0;;3400;--;0;post-only;Cancelled
05/Mar/2024 13:10:00;PF_ETHUSD;Sell;1;3510;3510;--;0,5;;Filled
";

#[test]
fn account_log_and_order_history_merge_into_one_ledger() {
    let log_table = RawTable::from_csv_str(ACCOUNT_LOG, "account_log.csv").unwrap();
    let order_table = RawTable::from_csv_str(ORDER_HISTORY, "orders.csv").unwrap();

    let log_batch = AccountLogMapper::kraken_futures().map(&log_table);
    let order_batch = OrderHistoryMapper::new(Source::KrakenFutures).map(&order_table);

    assert_eq!(log_batch.report.rows_read, 4);
    assert_eq!(log_batch.report.skipped_noise, 1);
    assert_eq!(log_batch.records.len(), 3);

    assert_eq!(order_batch.report.skipped_status, 1);
    assert_eq!(order_batch.report.skipped_placeholder, 1);
    assert_eq!(order_batch.records.len(), 1);

    let outcome = MergeEngine::new().merge([log_batch.records, order_batch.records]);
    let ledger = outcome.records;

    assert_eq!(outcome.stats.duplicates_dropped, 1);
    assert_eq!(ledger.len(), 3);

    // 시각순: 주문 내역(13:00) → 체결(14:22) → 펀딩(16:00)
    assert_eq!(ledger[0].side, "SELL");
    assert_eq!(ledger[0].net_pnl(), dec!(3.75));
    assert_eq!(ledger[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 5, 13, 0, 0).unwrap());
    assert!(ledger[0].notes.ends_with("reduce-only"));

    assert_eq!(ledger[1].identity_key(), "KRAKENF|LOG|a-1");
    assert_eq!(ledger[1].net_pnl(), dec!(12.0));

    assert_eq!(ledger[2].identity_key(), "KRAKENF|LOG|a-3");
    assert_eq!(ledger[2].funding(), dec!(-0.03));
}

#[test]
fn same_composite_fields_collapse_across_sources() {
    let headers = ["time", "symbol", "side", "qty", "avg price", "pnl", "fee", "status"];
    let row = vec![
        "2024-03-05T12:00:00Z",
        "BTCUSDT",
        "sell",
        "0.5",
        "64000",
        "10",
        "0.2",
        "filled",
    ];
    let bybit = OrderHistoryMapper::new(Source::BybitFutures)
        .map(&RawTable::from_rows("bybit.csv", headers, vec![row.clone()]));
    let binance = OrderHistoryMapper::new(Source::BinanceFutures)
        .map(&RawTable::from_rows("binance.csv", headers, vec![row]));

    let outcome = MergeEngine::new().merge([bybit.records, binance.records]);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].source, Source::BybitFutures);
    assert_eq!(outcome.stats.duplicates_dropped, 1);
}
