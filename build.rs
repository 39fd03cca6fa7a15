fn main() {
    // Node addon linking only matters for the napi build.
    if std::env::var_os("CARGO_FEATURE_NAPI").is_some() {
        napi_build::setup();
    }
}
