//! Property and stress tests for the channel registry

use bitfinex::{ChannelRegistry, CurrencyPair, StreamSymbol};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const BASES: [&str; 6] = ["BTC", "ETH", "XRP", "LTC", "EOS", "IOT"];

#[derive(Debug, Clone)]
enum Op {
    Bind(u32, usize),
    Unbind(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..10, 0usize..BASES.len()).prop_map(|(id, sym)| Op::Bind(id, sym)),
        (1u32..10).prop_map(Op::Unbind),
    ]
}

fn symbol(index: usize) -> StreamSymbol {
    StreamSymbol::Ticker(CurrencyPair::new(BASES[index], "USD"))
}

proptest! {
    /// The registry matches a model where each id holds its last binding and
    /// binding a symbol elsewhere evicts its previous id
    #[test]
    fn prop_resolve_reflects_last_binding(ops in proptest::collection::vec(op(), 0..60)) {
        let registry = ChannelRegistry::new();
        let mut model: HashMap<u32, StreamSymbol> = HashMap::new();

        for op in &ops {
            match op {
                Op::Bind(id, sym) => {
                    let symbol = symbol(*sym);
                    model.retain(|other, bound| *other == *id || *bound != symbol);
                    model.insert(*id, symbol.clone());
                    registry.bind(*id, symbol);
                }
                Op::Unbind(id) => {
                    prop_assert_eq!(registry.unbind(*id), model.remove(id));
                }
            }
        }

        for id in 1u32..10 {
            prop_assert_eq!(registry.resolve(id), model.get(&id).cloned());
        }
        prop_assert_eq!(registry.len(), model.len());
    }

    /// No symbol is ever reachable from two ids
    #[test]
    fn prop_find_channel_is_unique(ops in proptest::collection::vec(op(), 0..60)) {
        let registry = ChannelRegistry::new();
        for op in &ops {
            match op {
                Op::Bind(id, sym) => registry.bind(*id, symbol(*sym)),
                Op::Unbind(id) => {
                    registry.unbind(*id);
                }
            }
        }

        for index in 0..BASES.len() {
            let symbol = symbol(index);
            let holders: Vec<u32> = registry
                .bindings()
                .into_iter()
                .filter(|binding| binding.symbol == symbol)
                .map(|binding| binding.channel_id)
                .collect();
            prop_assert!(holders.len() <= 1);
            prop_assert_eq!(registry.find_channel(&symbol), holders.first().copied());
        }
    }

    /// Concurrent binders always wake the waiter, whatever the interleaving
    #[test]
    fn prop_wait_for_count_never_misses_wakeup(
        binders in 1usize..6,
        delays in proptest::collection::vec(0u64..3, 6),
    ) {
        let registry = Arc::new(ChannelRegistry::new());

        let handles: Vec<_> = (0..binders)
            .map(|index| {
                let registry = Arc::clone(&registry);
                let delay = delays[index];
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(delay));
                    registry.bind(index as u32 + 1, symbol(index));
                })
            })
            .collect();

        prop_assert!(registry.wait_for_count(binders, Duration::from_secs(10)));

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

#[test]
fn test_snapshot_restore_under_concurrent_readers() {
    let registry = Arc::new(ChannelRegistry::new());
    for index in 0..BASES.len() {
        registry.bind(index as u32 + 1, symbol(index));
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..500 {
                    // A reader sees all bindings or none, never a partial set
                    let len = registry.bindings().len();
                    assert!(len == 0 || len == BASES.len(), "partial view: {}", len);
                }
            })
        })
        .collect();

    for _ in 0..200 {
        let snapshot = registry.snapshot_and_clear();
        registry.restore(&snapshot);
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(registry.len(), BASES.len());
}
