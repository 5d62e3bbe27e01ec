//! ERC-20 calldata and return values via `alloy_sol_types`.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};

use crate::error::ChainError;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

fn malformed(call: &str, e: alloy_sol_types::Error) -> ChainError {
    ChainError::InvalidResponse(format!("{call}: {e}"))
}

pub fn balance_of(owner: Address) -> Vec<u8> {
    IERC20::balanceOfCall { owner }.abi_encode()
}

pub fn transfer(to: Address, amount: U256) -> Vec<u8> {
    IERC20::transferCall { to, amount }.abi_encode()
}

pub fn decimals() -> Vec<u8> {
    IERC20::decimalsCall {}.abi_encode()
}

pub fn symbol() -> Vec<u8> {
    IERC20::symbolCall {}.abi_encode()
}

pub fn name() -> Vec<u8> {
    IERC20::nameCall {}.abi_encode()
}

pub fn decode_balance(output: &[u8]) -> Result<U256, ChainError> {
    IERC20::balanceOfCall::abi_decode_returns(output, true)
        .map(|ret| ret._0)
        .map_err(|e| malformed("balanceOf", e))
}

pub fn decode_decimals(output: &[u8]) -> Result<u8, ChainError> {
    IERC20::decimalsCall::abi_decode_returns(output, true)
        .map(|ret| ret._0)
        .map_err(|e| malformed("decimals", e))
}

/// Decode a `symbol()`/`name()` answer. Tokens that predate the standard
/// return a NUL-padded `bytes32` instead of a `string`.
pub fn decode_text(output: &[u8]) -> Result<String, ChainError> {
    if output.len() == 32 {
        let end = output.iter().position(|b| *b == 0).unwrap_or(32);
        return String::from_utf8(output[..end].to_vec())
            .map_err(|e| ChainError::InvalidResponse(format!("bytes32 text: {e}")));
    }
    IERC20::symbolCall::abi_decode_returns(output, true)
        .map(|ret| ret._0)
        .map_err(|e| malformed("string", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Address = Address::new([
        0x5a, 0xae, 0xb6, 0x05, 0x3f, 0x3e, 0x94, 0xc9, 0xb9, 0xa0, 0x9f, 0x33, 0x66, 0x94,
        0x35, 0xe7, 0xef, 0x1b, 0xea, 0xed,
    ]);

    fn word(value: U256) -> [u8; 32] {
        value.to_be_bytes()
    }

    #[test]
    fn balance_of_calldata_layout() {
        assert_eq!(
            hex::encode(balance_of(OWNER)),
            "70a08231\
             0000000000000000000000005aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        );
    }

    #[test]
    fn transfer_calldata_carries_full_width_amount() {
        let amount = U256::from(1u8) << 200;
        let data = transfer(OWNER, amount);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert_eq!(&data[4 + 12..4 + 32], OWNER.as_slice());
        assert_eq!(U256::from_be_slice(&data[36..]), amount);
    }

    #[test]
    fn selectors_for_reads() {
        assert_eq!(hex::encode(decimals()), "313ce567");
        assert_eq!(hex::encode(symbol()), "95d89b41");
        assert_eq!(hex::encode(name()), "06fdde03");
    }

    #[test]
    fn balance_at_and_above_two_to_the_128_decodes() {
        let at = U256::from(1u8) << 128;
        assert_eq!(decode_balance(&word(at)).unwrap(), at);
        assert_eq!(decode_balance(&word(U256::MAX)).unwrap(), U256::MAX);
        assert!(decode_balance(&[0u8; 4]).is_err());
    }

    #[test]
    fn decimals_must_fit_uint8() {
        assert_eq!(decode_decimals(&word(U256::from(18u8))).unwrap(), 18);
        assert!(decode_decimals(&word(U256::from(256u16))).is_err());
    }

    #[test]
    fn decode_dynamic_string() {
        // offset = 0x20, len = 4, "LINK"
        let output = hex::decode(
            "0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000004\
             4c494e4b00000000000000000000000000000000000000000000000000000000",
        )
        .unwrap();
        assert_eq!(decode_text(&output).unwrap(), "LINK");
    }

    #[test]
    fn decode_bytes32_string() {
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_text(&word).unwrap(), "MKR");
    }

    #[test]
    fn decode_truncated_string_fails() {
        let output = hex::decode(
            "0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000040",
        )
        .unwrap();
        assert!(decode_text(&output).is_err());
    }
}
