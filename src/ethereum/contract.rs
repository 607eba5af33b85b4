use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi},
    primitives::Bytes,
};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::slice;

use crate::codec::reduced_abi_json;
use crate::ethereum::abi::FunctionEntry;

/// Build the alloy representation of a function for encoding and decoding.
pub fn to_alloy_function(function: &FunctionEntry) -> Result<Function> {
    let json = reduced_abi_json(slice::from_ref(function))
        .map_err(|e| anyhow!("Failed to serialize function '{}': {}", function.name, e))?;
    let abi: JsonAbi = serde_json::from_value(json)
        .map_err(|e| anyhow!("Unsupported function '{}': {}", function.signature(), e))?;

    abi.functions()
        .next()
        .cloned()
        .ok_or_else(|| anyhow!("Function '{}' could not be built", function.name))
}

/// Coerce raw user strings to the declared parameter types and encode the
/// call data, selector included.
pub fn encode_function_call(function: &Function, inputs: &[String]) -> Result<Bytes> {
    let mut values = Vec::with_capacity(function.inputs.len());
    for (i, param) in function.inputs.iter().enumerate() {
        let raw = inputs.get(i).map(String::as_str).unwrap_or("").trim();
        let ty = param
            .resolve()
            .map_err(|e| anyhow!("Unsupported Solidity type '{}': {}", param.ty, e))?;
        let value = ty.coerce_str(raw).map_err(|e| {
            anyhow!(
                "Invalid parameter #{} ('{}' of type '{}'): {}",
                i + 1,
                param.name,
                param.ty,
                e
            )
        })?;
        values.push(value);
    }

    let encoded = function
        .abi_encode_input(&values)
        .map_err(|e| anyhow!("Failed to encode function inputs: {}", e))?;

    Ok(encoded.into())
}

/// Decode return data into JSON. Functions without outputs decode to
/// `Value::Null`; empty data for a function that declares outputs is an error.
pub fn decode_function_result(function: &Function, result_bytes: &[u8]) -> Result<Value> {
    if function.outputs.is_empty() {
        return Ok(Value::Null);
    }
    if result_bytes.is_empty() {
        return Err(anyhow!(
            "{} returned no data (0x). Is the contract deployed on this network?",
            function.signature()
        ));
    }

    let decoded = function
        .abi_decode_output(result_bytes, false)
        .map_err(|e| anyhow!("Failed to decode output: {}", e))?;

    dyn_sol_values_to_json(&decoded)
}

fn dyn_sol_values_to_json(values: &[DynSolValue]) -> Result<Value> {
    if values.len() == 1 {
        dyn_sol_value_to_json(&values[0])
    } else {
        values
            .iter()
            .map(dyn_sol_value_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }
}

fn dyn_sol_value_to_json(value: &DynSolValue) -> Result<Value> {
    match value {
        DynSolValue::Address(addr) => Ok(Value::String(addr.to_checksum(None))),
        DynSolValue::Function(func) => Ok(Value::String(format!("0x{}", hex::encode(func)))),
        DynSolValue::Uint(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Int(num, _) => Ok(Value::String(num.to_string())),
        DynSolValue::Bool(b) => Ok(Value::Bool(*b)),
        DynSolValue::String(s) => Ok(Value::String(s.clone())),
        DynSolValue::Bytes(bytes) => Ok(Value::String(format!("0x{}", hex::encode(bytes)))),
        DynSolValue::FixedBytes(word, size) => Ok(Value::String(format!(
            "0x{}",
            hex::encode(&word[..*size])
        ))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            items
                .iter()
                .map(dyn_sol_value_to_json)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        #[allow(unreachable_patterns)]
        other => Err(anyhow!("Unsupported DynSolValue type: {:?}", other)),
    }
}
