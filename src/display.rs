use chrono::Local;
use rust_decimal::Decimal;

use crate::error::{Result, SimError};
use crate::pools::{Asset, PoolState};
use crate::simulation::{CorrelationTracker, HeartsLawProjection, SimulationHistory, SimulationStep};

const WIDTH: usize = 67;

fn rule() {
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(WIDTH));
}

fn banner(title: &str) {
    println!();
    rule();
    println!("\x1b[1;36m  {}\x1b[0m", title);
    rule();
}

/// `$0.00001234` below a dollar, `$12.34` above
pub fn format_usd(price: Decimal) -> String {
    if price.abs() < Decimal::ONE {
        format!("${:.8}", price.round_dp(8))
    } else {
        format!("${:.2}", price.round_dp(2))
    }
}

fn format_optional_usd(price: Option<Decimal>) -> String {
    price.map(format_usd).unwrap_or_else(|| "n/a".to_string())
}

/// Green for rises, red for falls
fn colored_pct(pct: Decimal) -> String {
    let color = if pct >= Decimal::ZERO { "32" } else { "31" };
    format!("\x1b[1;{}m{:+.6}%\x1b[0m", color, pct)
}

fn or_na(value: Result<String>) -> String {
    value.unwrap_or_else(|_| "n/a".to_string())
}

fn print_pool(label: &str, pool: &PoolState) {
    println!("  {}:", label);
    for asset in [Asset::A, Asset::B] {
        println!(
            "    {:<8} {:>28.8}   ({})",
            pool.symbol(asset),
            pool.reserve(asset),
            format_optional_usd(pool.usd_price(asset))
        );
    }
    if let Ok(price) = pool.price_of(Asset::A) {
        println!(
            "    Price:   1 {} = {:.12} {}",
            pool.symbol(Asset::A),
            price,
            pool.symbol(Asset::B)
        );
    }
}

/// Pool the session starts from
pub fn print_pool_info(name: &str, pool: &PoolState, fee_bps: u32) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    banner(&format!("{} | {} | {}", name.to_uppercase(), pool.pair_label(), timestamp));
    println!("  Pool: {}", pool.address());
    if let Some(tvl) = pool.usd_value() {
        println!("  Liquidity: {}", format_usd(tvl));
    }
    println!("  Fee: {:.2}%", Decimal::from(fee_bps) / Decimal::ONE_HUNDRED);
    println!();
    print_pool("POOL STATE", pool);
}

/// Full report for one simulated step
pub fn print_step(step: &SimulationStep) {
    let request = step.request();
    let pre = step.pre_state();
    let input = request.direction().input();
    let output = request.direction().output();

    banner(&format!(
        "STEP {} | SELL {} {} FOR {}",
        step.step_index(),
        request.amount_in(),
        pre.symbol(input),
        pre.symbol(output)
    ));

    print_pool("POOL STATE BEFORE", pre);
    println!();
    print_pool("POOL STATE AFTER", step.post_state());
    println!();

    println!("  TRADE DETAILS:");
    println!("    Amount In:       {:.8} {}", request.amount_in(), pre.symbol(input));
    println!("    Amount Out:      {:.8} {}", step.amount_out(), pre.symbol(output));
    if !step.fee_paid().is_zero() {
        println!("    Fee Withheld:    {:.8} {}", step.fee_paid(), pre.symbol(input));
    }
    println!(
        "    Spot Price:      {:.12} {}/{}",
        step.spot_price_before(),
        pre.symbol(output),
        pre.symbol(input)
    );
    println!(
        "    Execution Price: {:.12} {}/{}",
        step.execution_price(),
        pre.symbol(output),
        pre.symbol(input)
    );
    println!();

    println!("  PRICE IMPACT:");
    println!("    Price Impact:    {}", colored_pct(step.price_impact_pct()));
    println!(
        "    Slippage:        {}",
        or_na(step.slippage_pct().map(|p| format!("{:.6}%", p)))
    );
    let change = step.price_change_ratio().and_then(|ratio| {
        (ratio - Decimal::ONE)
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| SimError::InvalidInput(format!("price change {} overflows", ratio)))
    });
    println!("    {} Price Change: {}", pre.symbol(output), or_na(change.map(colored_pct)));
    println!(
        "    X Factor:        {}",
        or_na(step.x_factor().map(|x| format!("{:.6}x", x)))
    );
}

/// One line per step
pub fn print_history(history: &SimulationHistory) {
    banner("SIMULATION HISTORY");

    if history.is_empty() {
        println!("  No steps simulated.");
        return;
    }

    println!(
        "  \x1b[1m{:>4} │ {:>5} │ {:>18} │ {:>18} │ {:>12}\x1b[0m",
        "#", "Dir", "Amount In", "Amount Out", "Impact"
    );
    println!("  {}", "─".repeat(4 + 3 + 5 + 3 + 18 + 3 + 18 + 3 + 12));

    for step in history.all_records() {
        println!(
            "  {:>4} │ {:>5} │ {:>18.6} │ {:>18.6} │ {:>+11.4}%",
            step.step_index(),
            step.request().direction().to_string(),
            step.request().amount_in(),
            step.amount_out(),
            step.price_impact_pct()
        );
    }

    if let Ok(Some(change)) = history.cumulative_change_pct() {
        if let Some(first) = history.all_records().next() {
            println!();
            println!(
                "  Cumulative {} price change: {}",
                first.pre_state().symbol(Asset::A),
                colored_pct(change)
            );
        }
    }
}

/// Implied prices recorded for one paired pool
pub fn print_correlation(tracker: &CorrelationTracker) {
    let paired = tracker.paired();
    banner(&format!(
        "HEARTS LAW | {} via {}",
        paired.pair_label(),
        tracker.shared().symbol()
    ));
    println!("  Paired pool: {}", paired.address());

    if tracker.records().is_empty() {
        println!("  No correlated steps.");
        return;
    }

    println!(
        "  \x1b[1m{:>4} │ {:>18} │ {:>18} │ {:>12} │ {:>16}\x1b[0m",
        "Step", "Price Before", "Implied Price", "Change", "Implied USD"
    );
    println!("  {}", "─".repeat(4 + 3 + 18 + 3 + 18 + 3 + 12 + 3 + 16));

    for record in tracker.records() {
        println!(
            "  {:>4} │ {:>18.10} │ {:>18.10} │ {:>12} │ {:>16}",
            record.source_step,
            record.paired_price_before,
            record.implied_price,
            or_na(record.change_pct().map(|p| format!("{:+.4}%", p))),
            format_optional_usd(record.implied_price_usd)
        );
    }
    println!();
    print_pool("PAIRED POOL NOW", paired);
}

/// Hearts Law what-if for a token quoted against its pair asset
pub fn print_hearts_law_projection(projection: &HeartsLawProjection) {
    println!();
    println!("  HEARTS LAW PROJECTION ({}):", projection.pool);
    println!(
        "    Current Price in {}: {}",
        projection.paired_symbol, projection.price_native
    );
    println!("    Current USD Price: {}", format_optional_usd(projection.current_usd));
    println!(
        "    Experimental {} Price: {}",
        projection.paired_symbol,
        format_usd(projection.experimental_paired_usd)
    );
    println!(
        "    Calculated {} Price: {}",
        projection.token_symbol,
        format_usd(projection.projected_usd)
    );
    println!("    Potential X: {:.2}x", projection.potential_x);
}
