use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Parse a contract address as typed by the user. Checksums are not enforced.
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();
    let Some(hex_part) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    else {
        return Err(anyhow!("'{}' must start with 0x", address));
    };

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("'{}' is not 20 bytes of hex", address));
    }

    Address::from_str(hex_part).map_err(|e| anyhow!("'{}': {}", address, e))
}

/// Short, user-facing text for common node errors. Unknown errors pass
/// through unchanged.
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        format!("Execution reverted: {}", error)
    } else if error.contains("insufficient funds") {
        "Insufficient funds to cover value and gas".to_string()
    } else if error.contains("nonce too low") {
        "Nonce too low, a transaction with this nonce was already mined".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: cannot reach the RPC endpoint".to_string()
    } else if error.contains("timeout") {
        "Network error: RPC request timed out".to_string()
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_ok());
        assert!(validate_address(" 0x3100000000000000000000000000000000000002 ").is_ok());

        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
    }

    #[test]
    fn test_interpret_rpc_error() {
        assert!(interpret_rpc_error("server returned: execution reverted: paused")
            .starts_with("Execution reverted"));
        assert!(interpret_rpc_error("error sending request: connection refused")
            .starts_with("Network error"));
        assert_eq!(interpret_rpc_error("something odd"), "something odd");
    }
}
