/// Display version information
pub fn execute() {
    println!("sogs-bot {}", env!("CARGO_PKG_VERSION"));
    println!("Community server bot with blinded-key authentication");
}
