//! Gas-limit targeting for produced blocks.

use shared_types::{ChainConfig, Header};

/// Gas limit of a block on top of `parent`.
///
/// The limit decays by `1/divisor` per block, grows with parent usage above
/// two thirds, and then moves toward `[floor, ceil]` by at most the decay.
/// The result always passes the validator's bound-divisor check.
pub fn calc_gas_limit(parent: &Header, floor: u64, ceil: u64, config: &ChainConfig) -> u64 {
    let divisor = config.gas_limit_bound_divisor.max(1);
    let contrib = (parent.gas_used + parent.gas_used / 2) / divisor;
    let decay = (parent.gas_limit / divisor).saturating_sub(1);

    let mut limit = (parent.gas_limit - decay).saturating_add(contrib);
    if limit < config.min_gas_limit {
        limit = config.min_gas_limit;
    }
    if limit < floor {
        limit = parent.gas_limit.saturating_add(decay).min(floor);
    } else if limit > ceil {
        limit = (parent.gas_limit - decay).max(ceil);
    }
    limit.max(config.min_gas_limit)
}
