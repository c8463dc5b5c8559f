//! Router action vocabulary.
//!
//! Each action is one opcode byte in the emitted instruction stream plus an
//! ABI-encoded parameter blob. Actions are strongly typed here; unknown
//! opcodes and malformed blobs are rejected at decode time instead of being
//! coerced.

use crate::errors::{AppError, Result};
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, I256, U256};

pub const OP_SWAP_EXACT_IN: u8 = 0x07;
pub const OP_SETTLE: u8 = 0x0b;
pub const OP_TAKE: u8 = 0x0e;

/// The native asset is addressed as zero on both the curve and the router.
pub fn is_native(currency: &Address) -> bool {
    currency.is_zero()
}

/// One hop of a swap path: the currency the hop ends in plus the pool
/// parameters that, together with the previous currency, identify the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey {
    pub intermediate: Address,
    pub fee_ppm: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapExactInParams {
    pub currency_in: Address,
    pub path: Vec<PathKey>,
    pub amount_in: u128,
    pub min_amount_out: u128,
}

impl SwapExactInParams {
    /// Currency the final hop pays out.
    pub fn currency_out(&self) -> Option<Address> {
        self.path.last().map(|hop| hop.intermediate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleParams {
    pub currency: Address,
    pub amount: U256,
    /// True pulls funds from the caller (requires prior allowance for
    /// ERC-20s); false spends the router's own balance, which is how native
    /// value sent along with the call is consumed.
    pub payer_is_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeParams {
    pub currency: Address,
    pub recipient: Address,
    pub min_amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAction {
    SwapExactIn(SwapExactInParams),
    Settle(SettleParams),
    Take(TakeParams),
}

impl RouterAction {
    pub fn opcode(&self) -> u8 {
        match self {
            RouterAction::SwapExactIn(_) => OP_SWAP_EXACT_IN,
            RouterAction::Settle(_) => OP_SETTLE,
            RouterAction::Take(_) => OP_TAKE,
        }
    }

    /// ABI-encode this action's parameter blob.
    pub fn encode_params(&self) -> Bytes {
        let tokens = match self {
            RouterAction::SwapExactIn(p) => vec![
                Token::Address(p.currency_in),
                Token::Array(p.path.iter().map(path_key_token).collect()),
                Token::Uint(U256::from(p.amount_in)),
                Token::Uint(U256::from(p.min_amount_out)),
            ],
            RouterAction::Settle(p) => vec![
                Token::Address(p.currency),
                Token::Uint(p.amount),
                Token::Bool(p.payer_is_user),
            ],
            RouterAction::Take(p) => vec![
                Token::Address(p.currency),
                Token::Address(p.recipient),
                Token::Uint(p.min_amount),
            ],
        };
        Bytes::from(abi::encode(&tokens))
    }

    /// Decode one opcode + blob back into a typed action. Unknown opcodes
    /// are an error, not a passthrough.
    pub fn decode(opcode: u8, blob: &[u8]) -> Result<Self> {
        match opcode {
            OP_SWAP_EXACT_IN => {
                let tokens = abi::decode(
                    &[
                        ParamType::Address,
                        ParamType::Array(Box::new(ParamType::Tuple(vec![
                            ParamType::Address,
                            ParamType::Uint(24),
                            ParamType::Int(24),
                            ParamType::Address,
                        ]))),
                        ParamType::Uint(128),
                        ParamType::Uint(128),
                    ],
                    blob,
                )?;
                let mut it = tokens.into_iter();
                let currency_in = expect_address(it.next(), "currency_in")?;
                let path = match it.next() {
                    Some(Token::Array(entries)) => entries
                        .into_iter()
                        .map(|t| path_key_from_token(t))
                        .collect::<Result<Vec<_>>>()?,
                    other => return Err(blob_shape("path", other)),
                };
                let amount_in = expect_u128(it.next(), "amount_in")?;
                let min_amount_out = expect_u128(it.next(), "min_amount_out")?;
                Ok(RouterAction::SwapExactIn(SwapExactInParams {
                    currency_in,
                    path,
                    amount_in,
                    min_amount_out,
                }))
            }
            OP_SETTLE => {
                let tokens = abi::decode(
                    &[ParamType::Address, ParamType::Uint(256), ParamType::Bool],
                    blob,
                )?;
                let mut it = tokens.into_iter();
                let currency = expect_address(it.next(), "currency")?;
                let amount = expect_uint(it.next(), "amount")?;
                let payer_is_user = match it.next() {
                    Some(Token::Bool(b)) => b,
                    other => return Err(blob_shape("payer_is_user", other)),
                };
                Ok(RouterAction::Settle(SettleParams {
                    currency,
                    amount,
                    payer_is_user,
                }))
            }
            OP_TAKE => {
                let tokens = abi::decode(
                    &[
                        ParamType::Address,
                        ParamType::Address,
                        ParamType::Uint(256),
                    ],
                    blob,
                )?;
                let mut it = tokens.into_iter();
                let currency = expect_address(it.next(), "currency")?;
                let recipient = expect_address(it.next(), "recipient")?;
                let min_amount = expect_uint(it.next(), "min_amount")?;
                Ok(RouterAction::Take(TakeParams {
                    currency,
                    recipient,
                    min_amount,
                }))
            }
            other => Err(AppError::Encoding(format!("unknown opcode 0x{other:02x}"))),
        }
    }
}

fn path_key_token(hop: &PathKey) -> Token {
    Token::Tuple(vec![
        Token::Address(hop.intermediate),
        Token::Uint(U256::from(hop.fee_ppm)),
        Token::Int(I256::from(hop.tick_spacing).into_raw()),
        Token::Address(hop.hooks),
    ])
}

fn path_key_from_token(token: Token) -> Result<PathKey> {
    let Token::Tuple(fields) = token else {
        return Err(AppError::Encoding("path entry is not a tuple".into()));
    };
    let mut it = fields.into_iter();
    let intermediate = expect_address(it.next(), "path.intermediate")?;
    let fee_ppm = expect_u128(it.next(), "path.fee_ppm")? as u32;
    let tick_spacing = match it.next() {
        Some(Token::Int(raw)) => i32::try_from(I256::from_raw(raw))
            .map_err(|_| AppError::Encoding("path.tick_spacing out of i32 range".into()))?,
        other => return Err(blob_shape("path.tick_spacing", other)),
    };
    let hooks = expect_address(it.next(), "path.hooks")?;
    Ok(PathKey {
        intermediate,
        fee_ppm,
        tick_spacing,
        hooks,
    })
}

fn expect_address(token: Option<Token>, what: &str) -> Result<Address> {
    match token {
        Some(Token::Address(a)) => Ok(a),
        other => Err(blob_shape(what, other)),
    }
}

fn expect_uint(token: Option<Token>, what: &str) -> Result<U256> {
    match token {
        Some(Token::Uint(u)) => Ok(u),
        other => Err(blob_shape(what, other)),
    }
}

fn expect_u128(token: Option<Token>, what: &str) -> Result<u128> {
    let u = expect_uint(token, what)?;
    if u > U256::from(u128::MAX) {
        return Err(AppError::Encoding(format!("{what} exceeds u128")));
    }
    Ok(u.as_u128())
}

fn blob_shape(what: &str, got: Option<Token>) -> AppError {
    AppError::Encoding(format!("unexpected token for {what}: {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn swap_params_survive_encode_decode() {
        let action = RouterAction::SwapExactIn(SwapExactInParams {
            currency_in: Address::zero(),
            path: vec![
                PathKey {
                    intermediate: addr(0x11),
                    fee_ppm: 3000,
                    tick_spacing: 60,
                    hooks: addr(0x22),
                },
                PathKey {
                    intermediate: Address::zero(),
                    fee_ppm: 10_000,
                    tick_spacing: -200,
                    hooks: Address::zero(),
                },
            ],
            amount_in: 1_000_000_000,
            min_amount_out: 990_000_000,
        });
        let blob = action.encode_params();
        let decoded = RouterAction::decode(action.opcode(), &blob).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn settle_and_take_survive_encode_decode() {
        let settle = RouterAction::Settle(SettleParams {
            currency: addr(0x33),
            amount: U256::from(42u64),
            payer_is_user: true,
        });
        let take = RouterAction::Take(TakeParams {
            currency: Address::zero(),
            recipient: addr(0x44),
            min_amount: U256::from(41u64),
        });
        for action in [settle, take] {
            let blob = action.encode_params();
            assert_eq!(RouterAction::decode(action.opcode(), &blob).unwrap(), action);
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let blob = RouterAction::Settle(SettleParams {
            currency: addr(0x01),
            amount: U256::one(),
            payer_is_user: false,
        })
        .encode_params();
        let err = RouterAction::decode(0x42, &blob).unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)));
    }

    #[test]
    fn wrong_blob_shape_is_rejected() {
        // A settle blob decoded as a take has the wrong layout.
        let blob = RouterAction::Settle(SettleParams {
            currency: addr(0x01),
            amount: U256::one(),
            payer_is_user: true,
        })
        .encode_params();
        assert!(RouterAction::decode(OP_SWAP_EXACT_IN, &blob).is_err());
    }
}
