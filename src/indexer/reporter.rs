use crate::indexer::aggregator::AggregateState;
use crate::models::address::WatchedAddresses;

/// One line per watched address per asset class, token lines first.
/// Addresses without an entry report zero.
pub fn render_report(state: &AggregateState, watched: &WatchedAddresses) -> Vec<String> {
    let token_lines = watched.iter().map(|watched| {
        format!(
            "ERC20 transfer volume for address {} is {}",
            watched.canonical(),
            state.token_volume(&watched.address())
        )
    });
    let native_lines = watched.iter().map(|watched| {
        format!(
            "WEI transfer volume for address {} is {}",
            watched.canonical(),
            state.native_volume(&watched.address())
        )
    });
    token_lines.chain(native_lines).collect()
}
