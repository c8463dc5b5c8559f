//! Swap plan encoding for the launch router.
//!
//! The router executes a packed action stream atomically:
//! `execute(bytes actions, bytes[] params, uint256 deadline)`. Encoding is
//! pure and side-effect free; every consistency rule is checked locally
//! before bytes are emitted, because a simulation round-trip is far more
//! expensive than a local rejection.

use crate::errors::{AppError, Result};
use ethers::abi::AbiEncode;
use ethers::contract::abigen;
use ethers::types::{Address, Bytes, U256};

pub mod actions;

pub use actions::{
    is_native, PathKey, RouterAction, SettleParams, SwapExactInParams, TakeParams,
    OP_SETTLE, OP_SWAP_EXACT_IN, OP_TAKE,
};

abigen!(
    LaunchRouter,
    r#"[
        function execute(bytes actions, bytes[] params, uint256 deadline) payable
    ]"#,
);

/// A fully specified swap: input, output, path, floors and recipient.
/// Pure value type; consumed by [`encode_swap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: u128,
    pub min_amount_out: u128,
    /// Pool hops from `token_in` to `token_out`. Two hops with
    /// `token_in == token_out` express the atomic curve/pool round trip.
    pub path: Vec<PathKey>,
    pub recipient: Address,
}

/// Encoded router call, ready for simulation and broadcast.
#[derive(Debug, Clone)]
pub struct RouterCall {
    pub actions: Bytes,
    pub params: Vec<Bytes>,
    /// Full `execute(...)` calldata including the selector.
    pub calldata: Bytes,
    /// Native value to attach; nonzero only when selling the native asset.
    pub value: U256,
}

/// Validate a plan and encode it into the router's action stream.
pub fn encode_swap(plan: &SwapPlan, deadline: U256) -> Result<RouterCall> {
    validate_plan(plan)?;

    let native_in = is_native(&plan.token_in);

    let stream = vec![
        RouterAction::SwapExactIn(SwapExactInParams {
            currency_in: plan.token_in,
            path: plan.path.clone(),
            amount_in: plan.amount_in,
            min_amount_out: plan.min_amount_out,
        }),
        RouterAction::Settle(SettleParams {
            currency: plan.token_in,
            amount: U256::from(plan.amount_in),
            // Native input rides in as msg.value and is settled from the
            // router's own balance; an ERC-20 is pulled from the caller and
            // needs a prior allowance.
            payer_is_user: !native_in,
        }),
        RouterAction::Take(TakeParams {
            currency: plan.token_out,
            recipient: plan.recipient,
            min_amount: U256::from(plan.min_amount_out),
        }),
    ];
    check_stream(&stream)?;

    let actions = Bytes::from(stream.iter().map(RouterAction::opcode).collect::<Vec<u8>>());
    let params: Vec<Bytes> = stream.iter().map(RouterAction::encode_params).collect();

    let calldata = ExecuteCall {
        actions: actions.clone(),
        params: params.clone(),
        deadline,
    }
    .encode();

    Ok(RouterCall {
        actions,
        params,
        calldata: Bytes::from(calldata),
        value: if native_in {
            U256::from(plan.amount_in)
        } else {
            U256::zero()
        },
    })
}

/// Decode an action stream back into typed actions. Used in tests and for
/// manual replay of failed attempts.
pub fn decode_stream(actions: &[u8], params: &[Bytes]) -> Result<Vec<RouterAction>> {
    if actions.len() != params.len() {
        return Err(AppError::Encoding(format!(
            "{} opcodes but {} param blobs",
            actions.len(),
            params.len()
        )));
    }
    actions
        .iter()
        .zip(params)
        .map(|(op, blob)| RouterAction::decode(*op, blob))
        .collect()
}

fn validate_plan(plan: &SwapPlan) -> Result<()> {
    if plan.amount_in == 0 {
        return Err(AppError::Encoding("amount_in is zero".into()));
    }
    if plan.recipient.is_zero() {
        return Err(AppError::Encoding("recipient is the zero address".into()));
    }
    let Some(last) = plan.path.last() else {
        return Err(AppError::Encoding("empty swap path".into()));
    };
    if last.intermediate != plan.token_out {
        return Err(AppError::Encoding(format!(
            "path ends in {:?} but token_out is {:?}",
            last.intermediate, plan.token_out
        )));
    }
    if plan.token_in == plan.token_out && plan.path.len() < 2 {
        return Err(AppError::Encoding(
            "circular swap needs at least two hops".into(),
        ));
    }
    let mut previous = plan.token_in;
    for hop in &plan.path {
        if hop.intermediate == previous {
            return Err(AppError::Encoding(format!(
                "hop does not change currency: {:?}",
                hop.intermediate
            )));
        }
        previous = hop.intermediate;
    }
    Ok(())
}

/// Ordering and currency-consistency invariant over an action stream:
/// the swap must precede settle and take, the settle must name the swap's
/// input currency, and the take must name the path's output currency.
/// The router reverts on any of these; we fail locally instead.
pub fn check_stream(stream: &[RouterAction]) -> Result<()> {
    let swap_at = stream
        .iter()
        .position(|a| matches!(a, RouterAction::SwapExactIn(_)))
        .ok_or_else(|| AppError::Encoding("stream has no swap".into()))?;
    let RouterAction::SwapExactIn(swap) = &stream[swap_at] else {
        unreachable!()
    };
    let currency_out = swap
        .currency_out()
        .ok_or_else(|| AppError::Encoding("swap has empty path".into()))?;

    let mut seen_settle = false;
    let mut seen_take = false;
    for (i, action) in stream.iter().enumerate() {
        match action {
            RouterAction::SwapExactIn(_) if i != swap_at => {
                return Err(AppError::Encoding("more than one swap in stream".into()));
            }
            RouterAction::Settle(settle) => {
                if i < swap_at {
                    return Err(AppError::Encoding("settle precedes swap".into()));
                }
                if settle.currency != swap.currency_in {
                    return Err(AppError::Encoding(format!(
                        "settle currency {:?} does not match swap input {:?}",
                        settle.currency, swap.currency_in
                    )));
                }
                seen_settle = true;
            }
            RouterAction::Take(take) => {
                if i < swap_at {
                    return Err(AppError::Encoding("take precedes swap".into()));
                }
                if take.currency != currency_out {
                    return Err(AppError::Encoding(format!(
                        "take currency {:?} does not match swap output {:?}",
                        take.currency, currency_out
                    )));
                }
                seen_take = true;
            }
            _ => {}
        }
    }
    if !seen_settle || !seen_take {
        return Err(AppError::Encoding(
            "stream is missing a settle or a take".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    fn single_hop_plan(token_in: Address, token_out: Address) -> SwapPlan {
        SwapPlan {
            token_in,
            token_out,
            amount_in: 1000,
            min_amount_out: 900,
            path: vec![PathKey {
                intermediate: token_out,
                fee_ppm: 3000,
                tick_spacing: 60,
                hooks: Address::zero(),
            }],
            recipient: addr(0xaa),
        }
    }

    #[test]
    fn sell_token_for_native_round_trips_exactly() {
        let token = addr(0x51);
        let plan = single_hop_plan(token, Address::zero());
        let call = encode_swap(&plan, U256::from(1_700_000_000u64)).unwrap();

        assert_eq!(call.actions.len(), 3);
        assert_eq!(call.value, U256::zero(), "ERC-20 input attaches no value");

        let decoded = decode_stream(&call.actions, &call.params).unwrap();
        let RouterAction::SwapExactIn(swap) = &decoded[0] else {
            panic!("first action must be the swap");
        };
        assert_eq!(swap.currency_in, token);
        assert_eq!(swap.currency_out(), Some(Address::zero()));
        assert_eq!(swap.amount_in, 1000);
        let RouterAction::Settle(settle) = &decoded[1] else {
            panic!("second action must settle");
        };
        assert_eq!(settle.currency, token);
        assert!(settle.payer_is_user, "ERC-20 input is pulled from the user");
        let RouterAction::Take(take) = &decoded[2] else {
            panic!("third action must take");
        };
        assert_eq!(take.currency, Address::zero());
        assert_eq!(take.recipient, addr(0xaa));
        assert_eq!(take.min_amount, U256::from(900u64));
    }

    #[test]
    fn native_input_takes_the_value_branch() {
        let plan = single_hop_plan(Address::zero(), addr(0x51));
        let call = encode_swap(&plan, U256::one()).unwrap();
        assert_eq!(call.value, U256::from(1000u64));
        let decoded = decode_stream(&call.actions, &call.params).unwrap();
        let RouterAction::Settle(settle) = &decoded[1] else {
            panic!()
        };
        assert!(
            !settle.payer_is_user,
            "native input settles from the router balance, never an allowance"
        );
    }

    #[test]
    fn circular_two_hop_plan_encodes() {
        let token = addr(0x51);
        let plan = SwapPlan {
            token_in: Address::zero(),
            token_out: Address::zero(),
            amount_in: 5_000,
            min_amount_out: 5_050,
            path: vec![
                PathKey {
                    intermediate: token,
                    fee_ppm: 10_000,
                    tick_spacing: 200,
                    hooks: addr(0x77),
                },
                PathKey {
                    intermediate: Address::zero(),
                    fee_ppm: 3000,
                    tick_spacing: 60,
                    hooks: Address::zero(),
                },
            ],
            recipient: addr(0xaa),
        };
        let call = encode_swap(&plan, U256::one()).unwrap();
        assert_eq!(call.value, U256::from(5_000u64));
    }

    #[test]
    fn circular_single_hop_is_rejected() {
        let mut plan = single_hop_plan(Address::zero(), Address::zero());
        plan.path[0].intermediate = Address::zero();
        assert!(matches!(
            encode_swap(&plan, U256::one()),
            Err(AppError::Encoding(_))
        ));
    }

    #[test]
    fn mismatched_token_out_is_rejected() {
        let mut plan = single_hop_plan(addr(0x51), Address::zero());
        plan.token_out = addr(0x99);
        assert!(encode_swap(&plan, U256::one()).is_err());
    }

    #[test]
    fn zero_amount_and_zero_recipient_are_rejected() {
        let mut plan = single_hop_plan(addr(0x51), Address::zero());
        plan.amount_in = 0;
        assert!(encode_swap(&plan, U256::one()).is_err());

        let mut plan = single_hop_plan(addr(0x51), Address::zero());
        plan.recipient = Address::zero();
        assert!(encode_swap(&plan, U256::one()).is_err());
    }

    #[test]
    fn stream_checker_enforces_ordering() {
        let token = addr(0x51);
        let swap = RouterAction::SwapExactIn(SwapExactInParams {
            currency_in: token,
            path: vec![PathKey {
                intermediate: Address::zero(),
                fee_ppm: 3000,
                tick_spacing: 60,
                hooks: Address::zero(),
            }],
            amount_in: 10,
            min_amount_out: 9,
        });
        let settle = RouterAction::Settle(SettleParams {
            currency: token,
            amount: U256::from(10u64),
            payer_is_user: true,
        });
        let take = RouterAction::Take(TakeParams {
            currency: Address::zero(),
            recipient: addr(0xaa),
            min_amount: U256::from(9u64),
        });

        assert!(check_stream(&[swap.clone(), settle.clone(), take.clone()]).is_ok());
        assert!(check_stream(&[settle.clone(), swap.clone(), take.clone()]).is_err());
        assert!(check_stream(&[swap.clone(), settle.clone()]).is_err());

        let wrong_settle = RouterAction::Settle(SettleParams {
            currency: addr(0x99),
            amount: U256::from(10u64),
            payer_is_user: true,
        });
        assert!(check_stream(&[swap, wrong_settle, take]).is_err());
    }
}
