use alloy::primitives::Address;
use reserve_rates::{
    ControlInfo, RatesError,
    imbalance::{ImbalanceRecord, ImbalanceRecorder},
};

const TOKEN: Address = Address::with_last_byte(0x42);

const RESOLUTION: u64 = 2;
const MAX_PER_BLOCK: u64 = 4000;
const MAX_TOTAL: u64 = MAX_PER_BLOCK * 12;

fn recorder_with_resolution(resolution: u64) -> ImbalanceRecorder {
    let recorder = ImbalanceRecorder::new();
    recorder
        .set_control_info(TOKEN, ControlInfo::new(resolution, MAX_PER_BLOCK, MAX_TOTAL))
        .unwrap();
    recorder
}

fn recorder() -> ImbalanceRecorder {
    recorder_with_resolution(RESOLUTION)
}

#[test]
fn control_info_round_trips_and_rejects_zeroes() {
    let recorder = recorder();
    let info = recorder.control_info(TOKEN).unwrap();
    assert_eq!(info.minimal_record_resolution, RESOLUTION);
    assert_eq!(info.max_per_block_imbalance, MAX_PER_BLOCK);
    assert_eq!(info.max_total_imbalance, MAX_TOTAL);

    assert_eq!(
        recorder.set_control_info(TOKEN, ControlInfo::new(0, MAX_PER_BLOCK, MAX_TOTAL)),
        Err(RatesError::InvalidControlInfo)
    );

    let other = Address::with_last_byte(0x43);
    assert_eq!(recorder.control_info(other), Err(RatesError::UnknownAsset(other)));
    assert_eq!(recorder.add_trade(other, 10, 1, 1), Err(RatesError::UnknownAsset(other)));
}

#[test]
fn record_word_round_trips() {
    let record = ImbalanceRecord {
        last_block_units: -5,
        last_block: 11,
        total_units: -9,
        rate_update_block: 20,
    };
    assert_eq!(ImbalanceRecord::decode(record.encode()), record);

    let record = ImbalanceRecord {
        last_block_units: i64::MIN,
        last_block: u64::MAX,
        total_units: i64::MAX,
        rate_update_block: 0,
    };
    assert_eq!(ImbalanceRecord::decode(record.encode()), record);
}

#[test]
fn accumulates_within_one_block() {
    let recorder = recorder();
    for trade in [300, 700, 80, -200, -28] {
        recorder.add_trade(TOKEN, trade, 990, 1000).unwrap();
    }
    assert_eq!(recorder.imbalance(TOKEN, 990, 1000).unwrap(), (852, 852));
    // Reads are pure projections.
    assert_eq!(recorder.imbalance(TOKEN, 990, 1000).unwrap(), (852, 852));
}

#[test]
fn accumulates_negative_volume() {
    let recorder = recorder();
    for trade in [-200, -28] {
        recorder.add_trade(TOKEN, trade, 1001, 1002).unwrap();
    }
    assert_eq!(recorder.imbalance(TOKEN, 1001, 1002).unwrap(), (-228, -228));
}

#[test]
fn carries_total_across_blocks() {
    let recorder = recorder();
    let trades = [300, 700, 80, -200, -96, 22];
    let blocks = [1010, 1010, 1011, 1080, 1350, 1350];
    for (trade, block) in trades.into_iter().zip(blocks) {
        recorder.add_trade(TOKEN, trade, 1007, block).unwrap();
    }

    // The window wrapped twice, but the running total survives in the
    // newest record.
    assert_eq!(recorder.imbalance(TOKEN, 1007, 1350).unwrap(), (806, -74));
}

#[test]
fn price_update_resets_the_total() {
    let recorder = recorder();
    let trades = [100, 500, 64, -480, -6, 64, 210];
    let blocks = [2000, 2000, 2001, 2002, 2300, 2301, 2350];
    let updates = [2000, 2000, 2000, 2000, 2300, 2300, 2300];
    for ((trade, block), update) in trades.into_iter().zip(blocks).zip(updates) {
        recorder.add_trade(TOKEN, trade, update, block).unwrap();
    }

    // Only volume recorded under the 2300 update counts: -6 + 64 + 210.
    assert_eq!(recorder.imbalance(TOKEN, 2300, 2350).unwrap(), (268, 210));
}

#[test]
fn price_update_in_the_middle_of_a_block() {
    let recorder = recorder();
    let trades = [160, 620, 64, -480, -6, 64, 210];
    let blocks = [6000, 6001, 6001, 6002, 6002, 6002, 6002];
    let updates = [6000, 6000, 6000, 6000, 6000, 6002, 6002];
    for ((trade, block), update) in trades.into_iter().zip(blocks).zip(updates) {
        recorder.add_trade(TOKEN, trade, update, block).unwrap();
    }

    // The update landed mid-block 6002, so the whole block's volume is
    // folded into the new epoch: -480 - 6 + 64 + 210.
    assert_eq!(recorder.imbalance(TOKEN, 6002, 6002).unwrap(), (-212, -212));
}

#[test]
fn coarse_resolution_bounds_the_error() {
    let resolution = 13;
    let recorder = recorder_with_resolution(resolution);
    let trades = [160, 620, 64, -480, -6, 64, 210];
    let blocks = [6000, 6001, 6001, 6002, 6002, 6002, 6002];
    let updates = [6000, 6000, 6000, 6000, 6000, 6002, 6002];
    for ((trade, block), update) in trades.into_iter().zip(blocks).zip(updates) {
        recorder.add_trade(TOKEN, trade, update, block).unwrap();
    }

    let (total, current) = recorder.imbalance(TOKEN, 6002, 6002).unwrap();
    assert!((total + 212).abs() < resolution as i128, "total {total} off by over a unit");
    assert!((current + 212).abs() < resolution as i128, "current {current} off by over a unit");
}

#[test]
fn late_mined_price_update_recovers_prior_blocks() {
    let recorder = recorder_with_resolution(3);
    let trades = [162, 621, 63, -480, -6];
    let blocks = [20, 30, 32, 33, 34];
    let updates = [10, 10, 10, 10, 30];
    for ((trade, block), update) in trades.into_iter().zip(blocks).zip(updates) {
        recorder.add_trade(TOKEN, trade, update, block).unwrap();
    }

    // The price update at block 30 was observed late: trades from blocks
    // 30..34 were recorded under the old update, yet still count toward
    // the new epoch through the in-window per-block counters.
    assert_eq!(recorder.imbalance(TOKEN, 30, 34).unwrap(), (198, -6));
}

#[test]
fn crossing_max_total_is_still_recorded() {
    let recorder = recorder();
    let mut current_block = 7000;
    let mut traded: i128 = 0;

    while traded + MAX_PER_BLOCK as i128 <= MAX_TOTAL as i128 {
        recorder
            .add_trade(TOKEN, MAX_PER_BLOCK as i128, 7000, current_block)
            .unwrap();
        current_block += 1;
        traded += MAX_PER_BLOCK as i128;
    }

    // Caps are observational here: going past max total must not fail.
    let final_trade = MAX_PER_BLOCK as i128 + 800;
    recorder.add_trade(TOKEN, final_trade, 7000, current_block).unwrap();
    traded += final_trade;

    assert_eq!(recorder.imbalance(TOKEN, 7000, current_block).unwrap(), (traded, final_trade));
}

#[test]
fn imbalance_in_range_sums_covered_blocks() {
    let recorder = recorder();
    let trades = [160, 620, 64, -480, -6, 64, 210];
    let blocks = [6000, 6001, 6001, 6002, 6002, 6003, 6004];
    for (trade, block) in trades.into_iter().zip(blocks) {
        recorder.add_trade(TOKEN, trade, 6000, block).unwrap();
    }

    // Blocks 6001..=6003: 620 + 64 - 480 - 6 + 64.
    assert_eq!(recorder.imbalance_in_range(TOKEN, 6001, 6003).unwrap(), 262);
    assert_eq!(
        recorder.imbalance_in_range(TOKEN, 6003, 6001),
        Err(RatesError::InvalidBlockRange(6003, 6001))
    );
}

#[test]
fn trades_below_resolution_vanish() {
    let recorder = recorder_with_resolution(17);
    let mut current_block = 20_000;
    for _ in 0..20 {
        recorder.add_trade(TOKEN, 16, 20_000, current_block).unwrap();
        current_block += 1;
    }

    // Every trade compresses to zero units.
    assert_eq!(recorder.imbalance(TOKEN, 20_000, current_block).unwrap(), (0, 0));
}

#[test]
fn window_words_expose_packed_records() {
    let recorder = recorder();
    recorder.add_trade(TOKEN, 300, 990, 1000).unwrap();

    let words = recorder.window_words(TOKEN).unwrap();
    let record = ImbalanceRecord::decode(words[0]);
    assert_eq!(record.last_block, 1000);
    assert_eq!(record.last_block_units, 150);
    assert_eq!(record.total_units, 150);
    assert_eq!(record.rate_update_block, 990);

    // Untouched window positions stay zeroed.
    assert_eq!(ImbalanceRecord::decode(words[1]), ImbalanceRecord::default());
}
