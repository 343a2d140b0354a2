//! # Interface Descriptor
//!
//! Wraps a JSON ABI document (`alloy-json-abi`) and encodes/decodes the
//! calls the counter contract needs (`alloy-dyn-abi`).
//!
//! Call arguments and return values cross the domain boundary as [`Token`]s.
//! Supported parameter types: `address`, `bool`, `uint<N>`. Other types are
//! rejected with [`AbiError::UnsupportedType`].

use crate::domain::value_objects::{keccak256, Address, Bytes, U256};
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi, StateMutability};
use alloy_primitives::U256 as WordU256;
use alloy_sol_types::{Panic, Revert, SolError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The counter contract interface bundled with the crate.
pub const COUNTER_ABI_JSON: &str = include_str!("../../abi/counter.json");

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised while parsing the descriptor or encoding/decoding calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// The document is not a JSON ABI (array or artifact with `abi`).
    #[error("invalid ABI document: {0}")]
    InvalidDocument(String),

    /// The descriptor has no function with that name.
    #[error("function not in interface: {0}")]
    UnknownFunction(String),

    /// Wrong number of call arguments.
    #[error("{function} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Function name.
        function: String,
        /// Declared input count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// Argument does not match the declared parameter type.
    #[error("argument {index} of {function} must be {expected}")]
    TypeMismatch {
        /// Function name.
        function: String,
        /// Argument position.
        index: usize,
        /// Declared type.
        expected: String,
    },

    /// Parameter type outside the supported subset.
    #[error("unsupported ABI type: {0}")]
    UnsupportedType(String),

    /// Calldata or return data rejected by the codec.
    #[error("ABI codec error: {0}")]
    Codec(String),
}

impl From<alloy_dyn_abi::Error> for AbiError {
    fn from(e: alloy_dyn_abi::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// A call argument or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// `uint<N>`
    Uint(U256),
    /// `bool`
    Bool(bool),
}

impl Token {
    /// Returns the address if this is an `address` token.
    #[must_use]
    pub fn into_address(self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(address),
            _ => None,
        }
    }

    /// Returns the integer if this is a `uint` token.
    #[must_use]
    pub fn into_uint(self) -> Option<U256> {
        match self {
            Self::Uint(value) => Some(value),
            _ => None,
        }
    }

    /// Converts to a codec value for a parameter declared as `ty`.
    fn to_dyn(self, ty: &str) -> Option<DynSolValue> {
        match (self, ty) {
            (Self::Address(address), "address") => Some(DynSolValue::Address(
                alloy_primitives::Address::from(*address.as_bytes()),
            )),
            (Self::Bool(flag), "bool") => Some(DynSolValue::Bool(flag)),
            (Self::Uint(value), ty) => {
                let bits = uint_bits(ty)?;
                let mut word = [0u8; 32];
                value.to_big_endian(&mut word);
                Some(DynSolValue::Uint(WordU256::from_be_bytes(word), bits))
            }
            _ => None,
        }
    }

    fn from_dyn(value: DynSolValue) -> Result<Self, AbiError> {
        match value {
            DynSolValue::Address(address) => Ok(Self::Address(Address::new(address.into_array()))),
            DynSolValue::Uint(value, _) => Ok(Self::Uint(U256::from_big_endian(
                &value.to_be_bytes::<32>(),
            ))),
            DynSolValue::Bool(flag) => Ok(Self::Bool(flag)),
            other => Err(AbiError::UnsupportedType(
                other
                    .sol_type_name()
                    .map_or_else(|| "unknown".to_string(), |name| name.into_owned()),
            )),
        }
    }
}

/// Bit width of `uint<N>` (`uint` alone is `uint256`).
fn uint_bits(ty: &str) -> Option<usize> {
    match ty.strip_prefix("uint")? {
        "" => Some(256),
        digits => digits
            .parse::<usize>()
            .ok()
            .filter(|bits| *bits > 0 && *bits <= 256 && bits % 8 == 0),
    }
}

// =============================================================================
// FUNCTIONS
// =============================================================================

/// A callable function of the interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    inner: Function,
}

impl AbiFunction {
    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Canonical signature, e.g. `getCounter()`.
    #[must_use]
    pub fn signature(&self) -> String {
        self.inner.signature()
    }

    /// First four bytes of the Keccak-256 of the signature.
    #[must_use]
    pub fn selector(&self) -> [u8; 4] {
        self.inner.selector().0
    }

    /// True for `view`/`pure` functions, which are served by `eth_call`.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(
            self.inner.state_mutability,
            StateMutability::Pure | StateMutability::View
        )
    }

    /// Encodes calldata (selector + arguments) for this function.
    pub fn encode_call(&self, args: &[Token]) -> Result<Bytes, AbiError> {
        let inputs = &self.inner.inputs;
        if args.len() != inputs.len() {
            return Err(AbiError::ArityMismatch {
                function: self.inner.name.clone(),
                expected: inputs.len(),
                actual: args.len(),
            });
        }

        let values = inputs
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (param, arg))| {
                arg.to_dyn(&param.ty).ok_or_else(|| AbiError::TypeMismatch {
                    function: self.inner.name.clone(),
                    index,
                    expected: param.ty.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Bytes(self.inner.abi_encode_input(&values)?))
    }

    /// Decodes return data according to the declared outputs.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        self.inner
            .abi_decode_output(data)?
            .into_iter()
            .map(Token::from_dyn)
            .collect()
    }
}

// =============================================================================
// CONTRACT ABI
// =============================================================================

/// A bare ABI array, or a build artifact carrying one under `abi`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AbiDocument {
    Bare(JsonAbi),
    Artifact { abi: JsonAbi },
}

/// Parsed interface descriptor, keyed by function name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractAbi {
    functions: BTreeMap<String, AbiFunction>,
}

impl ContractAbi {
    /// Parses a JSON ABI array or a build artifact with an `abi` field.
    ///
    /// Overloaded names keep their first declaration.
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        let document: AbiDocument =
            serde_json::from_str(json).map_err(|e| AbiError::InvalidDocument(e.to_string()))?;
        let (AbiDocument::Bare(abi) | AbiDocument::Artifact { abi }) = document;

        let functions = abi
            .functions
            .into_iter()
            .filter_map(|(name, overloads)| {
                let first = overloads.into_iter().next()?;
                Some((name, AbiFunction { inner: first }))
            })
            .collect();
        Ok(Self { functions })
    }

    /// The bundled counter interface.
    pub fn counter() -> Result<Self, AbiError> {
        Self::from_json(COUNTER_ABI_JSON)
    }

    /// Looks up a function by name.
    pub fn function(&self, name: &str) -> Result<&AbiFunction, AbiError> {
        self.functions
            .get(name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Returns true if the interface declares `name`.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Iterates over all functions in name order.
    pub fn functions(&self) -> impl Iterator<Item = &AbiFunction> {
        self.functions.values()
    }
}

impl fmt::Display for ContractAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signatures: Vec<String> = self.functions().map(AbiFunction::signature).collect();
        write!(f, "[{}]", signatures.join(", "))
    }
}

// =============================================================================
// SELECTORS & REVERT DATA
// =============================================================================

/// Four-byte selector of a canonical signature.
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Decodes `Error(string)` and `Panic(uint256)` revert payloads.
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.starts_with(&Revert::SELECTOR) {
        return Revert::abi_decode(data).ok().map(|revert| revert.reason);
    }

    if data.starts_with(&Panic::SELECTOR) {
        let panic = Panic::abi_decode(data).ok()?;
        let limbs = panic.code.as_limbs();
        if limbs[1..].iter().any(|limb| *limb != 0) {
            return Some("panic".to_string());
        }
        let code = limbs[0];
        let meaning = match code {
            0x01 => "assertion failed",
            0x11 => "arithmetic overflow or underflow",
            0x12 => "division by zero",
            0x32 => "array index out of bounds",
            _ => "panic",
        };
        return Some(format!("{meaning} (0x{code:02x})"));
    }

    None
}

/// Encodes an `Error(string)` revert payload.
#[must_use]
pub fn encode_revert_reason(reason: &str) -> Vec<u8> {
    Revert {
        reason: reason.to_string(),
    }
    .abi_encode()
}

/// Encodes a `Panic(uint256)` revert payload.
#[must_use]
pub fn encode_panic(code: u64) -> Vec<u8> {
    Panic {
        code: WordU256::from(code),
    }
    .abi_encode()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_selectors() {
        let abi = ContractAbi::counter().unwrap();
        // Well-known selectors
        assert_eq!(
            abi.function("owner").unwrap().selector(),
            [0x8d, 0xa5, 0xcb, 0x5b]
        );
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            abi.function("getCounter").unwrap().signature(),
            "getCounter()"
        );
    }

    #[test]
    fn test_counter_abi_shape() {
        let abi = ContractAbi::counter().unwrap();
        for name in [
            "owner",
            "getCounter",
            "incrementCounter",
            "decrementCounter",
            "resetCounter",
        ] {
            assert!(abi.has_function(name), "missing {name}");
        }
        assert!(abi.function("getCounter").unwrap().is_read_only());
        assert!(!abi.function("resetCounter").unwrap().is_read_only());
        // Constructor and event entries are skipped
        assert_eq!(abi.functions().count(), 5);
    }

    #[test]
    fn test_artifact_document() {
        let json = r#"{
            "contractName": "Counter",
            "abi": [{
                "type": "function",
                "name": "getCounter",
                "inputs": [],
                "outputs": [{"name": "", "type": "uint256"}],
                "stateMutability": "view"
            }]
        }"#;
        let abi = ContractAbi::from_json(json).unwrap();
        assert!(abi.has_function("getCounter"));
        assert!(!abi.has_function("owner"));
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            ContractAbi::from_json("{\"not\":\"an abi\"}"),
            Err(AbiError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_unknown_function() {
        let abi = ContractAbi::counter().unwrap();
        assert_eq!(
            abi.function("burn").unwrap_err(),
            AbiError::UnknownFunction("burn".to_string())
        );
    }

    #[test]
    fn test_uint_widths() {
        assert_eq!(uint_bits("uint"), Some(256));
        assert_eq!(uint_bits("uint64"), Some(64));
        assert_eq!(uint_bits("uint7"), None);
        assert_eq!(uint_bits("int256"), None);
        assert_eq!(uint_bits("uint256[]"), None);
    }

    #[test]
    fn test_encode_with_arguments() {
        let json = r#"[{
            "type": "function",
            "name": "transfer",
            "inputs": [
                {"name": "to", "type": "address"},
                {"name": "amount", "type": "uint256"}
            ],
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable"
        }]"#;
        let abi = ContractAbi::from_json(json).unwrap();
        let transfer = abi.function("transfer").unwrap();

        let to = Address::new([0x22; 20]);
        let data = transfer
            .encode_call(&[Token::Address(to), Token::Uint(U256::from(5u64))])
            .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data.as_slice()[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data.as_slice()[16..36], to.as_bytes());
        assert_eq!(data.as_slice()[67], 5);

        let err = transfer
            .encode_call(&[Token::Uint(U256::one()), Token::Uint(U256::one())])
            .unwrap_err();
        assert!(matches!(err, AbiError::TypeMismatch { index: 0, .. }));

        let err = transfer.encode_call(&[]).unwrap_err();
        assert!(matches!(err, AbiError::ArityMismatch { expected: 2, actual: 0, .. }));
    }

    #[test]
    fn test_decode_outputs() {
        let abi = ContractAbi::counter().unwrap();
        let mut word = [0u8; 32];
        word[31] = 6;
        let tokens = abi.function("getCounter").unwrap().decode_output(&word).unwrap();
        assert_eq!(tokens, vec![Token::Uint(U256::from(6u64))]);

        let owner = Address::new([0xBB; 20]);
        let tokens = abi
            .function("owner")
            .unwrap()
            .decode_output(&owner.to_word())
            .unwrap();
        assert_eq!(tokens[0].into_address(), Some(owner));

        let err = abi.function("owner").unwrap().decode_output(&[]).unwrap_err();
        assert!(matches!(err, AbiError::Codec(_)));
    }

    #[test]
    fn test_revert_reason_decoding() {
        let data = encode_revert_reason("Only owner can reset");
        assert_eq!(data.len(), 4 + 32 + 32 + 32);
        assert_eq!(&data[..4], &[0x08, 0xc3, 0x79, 0xa0]);
        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("Only owner can reset")
        );

        let data = encode_panic(0x11);
        assert_eq!(&data[..4], &[0x4e, 0x48, 0x7b, 0x71]);
        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("arithmetic overflow or underflow (0x11)")
        );

        assert_eq!(decode_revert_reason(&[]), None);
        assert_eq!(decode_revert_reason(&[0xde, 0xad, 0xbe, 0xef]), None);
    }
}
