//! Formatted unique-id counters.
//!
//! Each allocation takes the counter after the highest one handed out so far
//! and renders it into the pool's `idFormat` template. Other pool properties
//! fill the remaining `{name}` tokens, so a pool such as
//! `idFormat = "VPN-{counter}-{network}"`, `network = "Network19"` yields
//! `VPN-4-Network19` for counter 4.

use super::{AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE};
use crate::error::{AllocationError, Result};
use crate::props::{render_plain, to_i64, PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::first_free;
use num_bigint::BigInt;
use std::collections::BTreeSet;

const KIND: &str = "Unique-id";
const COUNTER_TOKEN: &str = "{counter}";

/// Pool properties that configure the counter and are never substituted
const RESERVED: [&str; 4] = ["idFormat", "from", "to", "counterFormatWidth"];

/// Unique-id strategy
#[derive(Debug, Clone)]
pub struct UniqueIdStrategy {
    id_format: String,
    from: Option<i64>,
    to: Option<i64>,
    width: Option<usize>,
    substitutions: Vec<(String, String)>,
    allocated: BTreeSet<i64>,
    desired: Option<PropertyValue>,
}

impl UniqueIdStrategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let id_format = context.pool.text("idFormat", POOL)?.to_string();
        let from = context.pool.int_opt("from")?;
        let to = context.pool.int_opt("to")?;
        let width = context
            .pool
            .int_opt("counterFormatWidth")?
            .map(|w| usize::try_from(w).unwrap_or(0));

        let substitutions = context
            .pool
            .iter()
            .filter(|(key, _)| !RESERVED.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), render_plain(value)))
            .collect();

        let allocated = context
            .allocated()
            .map(|resource| resource.int("counter", RESOURCE))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self {
            id_format,
            from,
            to,
            width,
            substitutions,
            allocated,
            desired: context.user_input.get("desiredValue").cloned(),
        })
    }

    fn floor(&self) -> i64 {
        self.from.unwrap_or(0)
    }

    fn scope(&self) -> String {
        match self.to {
            Some(to) => format!("[{}-{}]", self.floor(), to),
            None => format!("[{}-{}]", self.floor(), i64::MAX),
        }
    }

    /// Counter following the highest allocated one, never below `from`
    fn next_counter(&self) -> Result<i64> {
        let floor = self.floor();
        let next = match self.allocated.iter().next_back() {
            Some(&highest) if highest >= floor => highest.checked_add(1),
            _ => Some(floor),
        };

        match (next, self.to) {
            (Some(next), Some(to)) if next <= to => Ok(next),
            (Some(next), None) => Ok(next),
            // Past the end: reuse the lowest released counter, if any
            _ => {
                let last = self.to.unwrap_or(i64::MAX);
                first_free(floor, &last, &self.allocated).ok_or_else(|| {
                    log::error!("Unique-id pool {} is full", self.scope());
                    AllocationError::Exhausted {
                        kind: KIND,
                        pool: self.scope(),
                        request: "a new counter".to_string(),
                        allocated: format!("{} counters", self.allocated.len()),
                    }
                })
            }
        }
    }

    fn desired_counter(&self, desired: &PropertyValue) -> Result<i64> {
        let counter = to_i64(desired)?;
        if counter < self.floor() || self.to.is_some_and(|to| counter > to) {
            log::warn!("Requested counter {} lies outside {}", counter, self.scope());
            return Err(AllocationError::OutOfRange {
                kind: KIND,
                value: counter.to_string(),
                range: format!("scope: {}", self.scope()),
            });
        }
        if self.allocated.contains(&counter) {
            log::warn!("Requested counter {} is already allocated", counter);
            return Err(AllocationError::AlreadyClaimed {
                kind: KIND,
                value: counter.to_string(),
            });
        }
        Ok(counter)
    }

    /// Substitute `{counter}` and the pool's `{name}` tokens, first occurrence each
    fn render(&self, counter: i64) -> String {
        let counter_text = match self.width {
            Some(width) => format!("{:0width$}", counter, width = width),
            None => counter.to_string(),
        };

        let mut text = self.id_format.replacen(COUNTER_TOKEN, &counter_text, 1);
        for (key, value) in &self.substitutions {
            text = text.replacen(&format!("{{{}}}", key), value, 1);
        }
        text
    }
}

impl AllocationStrategy for UniqueIdStrategy {
    fn allocate(&self) -> Result<PropertyBag> {
        if !self.id_format.contains(COUNTER_TOKEN) {
            return Err(AllocationError::MissingCounterToken);
        }

        let counter = match &self.desired {
            Some(desired) => self.desired_counter(desired)?,
            None => self.next_counter()?,
        };
        let text = self.render(counter);
        log::info!("Allocated unique id {} (counter {})", text, counter);

        let mut result = PropertyBag::new();
        result.insert("text".to_string(), PropertyValue::Text(text));
        result.insert("counter".to_string(), PropertyValue::Int(counter));
        Ok(result)
    }

    fn capacity(&self) -> Result<CapacityReport> {
        let utilized = BigInt::from(self.allocated.len());
        let total = match self.to {
            Some(to) => i128::from(to) - i128::from(self.floor()) + 1,
            None => i128::from(i64::MAX),
        };
        Ok(CapacityReport::new(BigInt::from(total) - &utilized, utilized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::props::AllocatedResource;

    fn strategy(pool: PropertyBag, counters: &[i64], user_input: PropertyBag) -> UniqueIdStrategy {
        let resources = counters
            .iter()
            .map(|c| AllocatedResource::new(props! { "counter" => *c, "text" => c.to_string() }))
            .collect();
        UniqueIdStrategy::new(StrategyContext::new(pool, resources, user_input)).unwrap()
    }

    #[test]
    fn test_output_and_capacity() {
        let pool = props! {
            "vpn" => "VPN85",
            "network" => "Network19",
            "idFormat" => "VPN-{counter}-{network}-{vpn}-local",
        };
        let s = strategy(pool, &[0, 1, 3], props! {});
        assert_eq!(
            s.allocate().unwrap(),
            props! { "counter" => 4, "text" => "VPN-4-Network19-VPN85-local" }
        );
        assert_eq!(s.capacity().unwrap(), CapacityReport::new(i64::MAX - 3, 3));
    }

    #[test]
    fn test_sequence_starts_at_zero_or_from() {
        let s = strategy(props! { "idFormat" => "L3VPN{counter}" }, &[], props! {});
        assert_eq!(s.allocate().unwrap(), props! { "counter" => 0, "text" => "L3VPN0" });

        let s = strategy(props! { "from" => 1000, "idFormat" => "{counter}" }, &[], props! {});
        assert_eq!(s.allocate().unwrap(), props! { "counter" => 1000, "text" => "1000" });

        let s = strategy(props! { "from" => 1000, "idFormat" => "{counter}" }, &[1000, 1001], props! {});
        assert_eq!(s.allocate().unwrap(), props! { "counter" => 1002, "text" => "1002" });
    }

    #[test]
    fn test_missing_counter_token() {
        let s = strategy(props! { "someProperty" => "L3VPN", "idFormat" => "{someProperty}" }, &[], props! {});
        assert_eq!(s.allocate().unwrap_err(), AllocationError::MissingCounterToken);

        let context = StrategyContext::new(props! { "someProperty" => "L3VPN" }, vec![], props! {});
        assert_eq!(
            UniqueIdStrategy::new(context).unwrap_err().to_string(),
            "Missing idFormat in pool properties"
        );
    }

    #[test]
    fn test_numbers_render_plainly() {
        let pool = props! { "idFormat" => "{site}-{ratio}-{counter}", "site" => 19, "ratio" => 2.0 };
        let s = strategy(pool, &[], props! {});
        assert_eq!(s.allocate().unwrap().text("text", "result").unwrap(), "19-2-0");
    }

    #[test]
    fn test_only_first_token_replaced() {
        let s = strategy(props! { "idFormat" => "{counter}-{counter}-{x}-{x}", "x" => "a" }, &[], props! {});
        assert_eq!(s.allocate().unwrap().text("text", "result").unwrap(), "0-{counter}-a-{x}");
    }

    #[test]
    fn test_counter_format_width_and_bounds() {
        let pool = props! { "idFormat" => "ID{counter}", "from" => 1, "to" => 3, "counterFormatWidth" => 4 };
        let s = strategy(pool.clone(), &[1], props! {});
        assert_eq!(s.allocate().unwrap(), props! { "counter" => 2, "text" => "ID0002" });
        assert_eq!(s.capacity().unwrap(), CapacityReport::new(2, 1));

        // released counter is reused once the top is reached
        let s = strategy(pool.clone(), &[1, 3], props! {});
        assert_eq!(s.allocate().unwrap(), props! { "counter" => 2, "text" => "ID0002" });

        let s = strategy(pool, &[1, 2, 3], props! {});
        assert!(s.allocate().unwrap_err().is_exhausted());
    }

    #[test]
    fn test_desired_value() {
        let pool = props! { "idFormat" => "{counter}", "from" => 10, "to" => 20 };
        let s = strategy(pool.clone(), &[10], props! { "desiredValue" => 15 });
        assert_eq!(s.allocate().unwrap(), props! { "counter" => 15, "text" => "15" });

        let s = strategy(pool.clone(), &[10], props! { "desiredValue" => 10 });
        assert_eq!(s.allocate().unwrap_err().to_string(), "Unique-id 10 was already claimed.");

        let s = strategy(pool, &[], props! { "desiredValue" => 21 });
        assert_eq!(s.allocate().unwrap_err().to_string(), "Unique-id 21 is out of scope: [10-20]");
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let pool = props! { "idFormat" => "{counter}", "from" => i64::MIN, "to" => i64::MAX };
        let s = strategy(pool, &[], props! {});
        assert_eq!(s.allocate().unwrap().int("counter", "result").unwrap(), i64::MIN);
        assert_eq!(
            s.capacity().unwrap(),
            CapacityReport::new(BigInt::from(u64::MAX) + 1u32, 0)
        );

        let pool = props! { "idFormat" => "{counter}", "from" => 0 };
        let s = strategy(pool, &[i64::MAX], props! {});
        assert_eq!(s.allocate().unwrap().int("counter", "result").unwrap(), 0);

        let s = strategy(props! { "idFormat" => "{counter}", "from" => i64::MAX }, &[i64::MAX], props! {});
        assert!(s.allocate().unwrap_err().is_exhausted());
    }
}
