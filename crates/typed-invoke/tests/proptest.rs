//! Property-based tests for the invoke contract using proptest.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use typed_invoke::{Invoker, Rest};

// ============================================================================
// Test helpers
// ============================================================================

/// Commands `f0`..`f3` take exactly k integers, `r0`..`r3` take at least k.
fn arity_invoker() -> Invoker {
    Invoker::builder()
        .command("f0", || 0)
        .command("f1", |_: i32| 0)
        .command("f2", |_: i32, _: i32| 0)
        .command("f3", |_: i32, _: i32, _: i32| 0)
        .command("r0", |rest: Rest<i32>| rest.len() as i32)
        .command("r1", |_: i32, rest: Rest<i32>| rest.len() as i32)
        .command("r2", |_: i32, _: i32, rest: Rest<i32>| rest.len() as i32)
        .command("r3", |_: i32, _: i32, _: i32, rest: Rest<i32>| rest.len() as i32)
        .build()
        .unwrap()
}

fn numbers(count: usize) -> Vec<String> {
    (0..count).map(|i| i.to_string()).collect()
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Without a rest parameter, only exactly k arguments are accepted.
    #[test]
    fn fixed_arity_is_exact(k in 0usize..4, n in 0usize..8) {
        let mut invoker = arity_invoker();
        let result = invoker.invoke(&format!("f{}", k), &numbers(n));
        if n == k {
            prop_assert_eq!(result.unwrap(), 0);
        } else {
            prop_assert!(result.unwrap_err().is_arity_mismatch());
        }
    }

    /// With a rest parameter, k or more arguments are accepted and the rest
    /// holds exactly the surplus.
    #[test]
    fn rest_arity_is_at_least(k in 0usize..4, n in 0usize..12) {
        let mut invoker = arity_invoker();
        let result = invoker.invoke(&format!("r{}", k), &numbers(n));
        if n >= k {
            prop_assert_eq!(result.unwrap(), (n - k) as i32);
        } else {
            prop_assert!(result.unwrap_err().is_arity_mismatch());
        }
    }

    /// Integer results pass through unchanged.
    #[test]
    fn return_passes_through(value in any::<i32>()) {
        let mut invoker = Invoker::new();
        invoker.register("id", |n: i32| n).unwrap();
        prop_assert_eq!(invoker.invoke("id", &[value.to_string()]).unwrap(), value);
    }

    /// Shell-quoted words reach a rest handler intact.
    #[test]
    fn quoted_words_round_trip(words in prop::collection::vec("[a-zA-Z0-9 '\"$.-]{0,12}", 0..6)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut invoker = Invoker::new();
        {
            let seen = Rc::clone(&seen);
            invoker
                .register("say", move |rest: Rest<String>| {
                    *seen.borrow_mut() = rest.into_inner();
                    0
                })
                .unwrap();
        }

        let line = std::iter::once("say".to_string())
            .chain(words.iter().map(|w| shell_words::quote(w).into_owned()))
            .collect::<Vec<_>>()
            .join(" ");

        prop_assert_eq!(invoker.invoke_line(&line).unwrap(), 0);
        prop_assert_eq!(&*seen.borrow(), &words);
    }

    /// Any parse failure is reported at the first bad position.
    #[test]
    fn first_bad_argument_is_reported(good in 0usize..5, tail in 0usize..5) {
        let mut invoker = arity_invoker();
        let mut args = numbers(good);
        args.push("bad".to_string());
        args.extend(std::iter::repeat("also-bad".to_string()).take(tail));

        match invoker.invoke("r0", &args).unwrap_err() {
            typed_invoke::InvokeError::Parse { position, input, .. } => {
                prop_assert_eq!(position, good);
                prop_assert_eq!(input, "bad");
            }
            other => prop_assert!(false, "expected Parse, got {:?}", other),
        }
    }
}
