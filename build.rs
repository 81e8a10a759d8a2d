use std::env;

fn main() {
    // ビルド時に環境変数を設定
    // 環境変数は外部（スクリプトや .env ファイル）から提供されることを前提とする
    // 実行時の環境変数が設定されていればそちらが優先される

    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    println!("cargo:rustc-env=ENVIRONMENT={}", environment);

    // API設定
    // 未設定の場合は実行時に環境ごとのデフォルトURLが使われる
    if let Ok(api_server_url) = env::var("API_SERVER_URL") {
        println!("cargo:rustc-env=API_SERVER_URL={}", api_server_url);
        println!("cargo:warning=APIサーバーURL: {}", api_server_url);
    }

    let api_timeout = env::var("API_TIMEOUT_SECONDS").unwrap_or_else(|_| "30".to_string());
    let api_max_retries = env::var("API_MAX_RETRIES").unwrap_or_else(|_| "1".to_string());
    let poll_interval =
        env::var("PAYMENT_POLL_INTERVAL_SECONDS").unwrap_or_else(|_| "5".to_string());

    println!("cargo:rustc-env=API_TIMEOUT_SECONDS={}", api_timeout);
    println!("cargo:rustc-env=API_MAX_RETRIES={}", api_max_retries);
    println!(
        "cargo:rustc-env=PAYMENT_POLL_INTERVAL_SECONDS={}",
        poll_interval
    );

    for var in [
        "ENVIRONMENT",
        "API_SERVER_URL",
        "API_TIMEOUT_SECONDS",
        "API_MAX_RETRIES",
        "PAYMENT_POLL_INTERVAL_SECONDS",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // ビルド情報を出力
    println!("cargo:warning=ビルド環境: {}", environment);
}
