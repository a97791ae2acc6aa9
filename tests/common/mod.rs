//! Common test utilities for QBE compiler tests
//!
//! Provides shared helper functions for:
//! - Opt-in log output (`RUST_LOG=qbe_sqljson=trace cargo test`)
//! - Compiling filters with the default or a custom configuration
//! - Pulling the expression and binds out of a compiled filter

#![allow(dead_code)]

use std::sync::Once;

use qbe_sqljson::{BindValue, CompiledFilter, CompilerConfig, QbeCompiler, QbeError};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn compiler() -> QbeCompiler {
    init_tracing();
    QbeCompiler::new(CompilerConfig::default()).expect("default config is valid")
}

pub fn compile(filter: &str) -> CompiledFilter {
    compile_with(CompilerConfig::default(), filter)
}

pub fn compile_with(config: CompilerConfig, filter: &str) -> CompiledFilter {
    init_tracing();
    QbeCompiler::new(config)
        .expect("config is valid")
        .compile_str(filter)
        .unwrap_or_else(|e| panic!("Failed to compile {}: {}", filter, e))
}

pub fn compile_err(filter: &str) -> QbeError {
    compiler()
        .compile_str(filter)
        .expect_err("filter should be rejected")
}

/// The JSON_EXISTS boolean expression.
pub fn expr(filter: &str) -> String {
    compile(filter)
        .json_exists
        .expect("filter should produce a JSON_EXISTS clause")
        .expression
}

/// The JSON_EXISTS bind values, in `$B<n>` order.
pub fn binds(filter: &str) -> Vec<BindValue> {
    compile(filter)
        .json_exists
        .map(|clause| clause.bind_values())
        .unwrap_or_default()
}

pub fn num(n: i64) -> BindValue {
    BindValue::from(n)
}

pub fn text(s: &str) -> BindValue {
    BindValue::from(s)
}
