/// Decimal places of one whole coin in the explorer's smallest unit.
pub const BTC_DECIMALS: u32 = 8;

/// Format an amount in the smallest unit as a decimal string with `decimals` places.
///
/// Works on the integer directly so large balances print exactly.
pub fn format_coin_amount(amount: i64, decimals: u32) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    if decimals == 0 {
        return format!("{}{}", sign, magnitude);
    }

    let scale = 10u128.pow(decimals);
    let whole = u128::from(magnitude) / scale;
    let fraction = u128::from(magnitude) % scale;
    format!(
        "{}{}.{:0width$}",
        sign,
        whole,
        fraction,
        width = decimals as usize
    )
}
