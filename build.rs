use chrono::{DateTime, Utc};

fn main() {
    // 构建时间，设置 SOURCE_DATE_EPOCH 时使用该时间以便复现构建
    let build_time = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);
    println!(
        "cargo:rustc-env=BUILD_TIME={}",
        build_time.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}
