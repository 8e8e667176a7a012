//! Drives the demo service set through the six worked scenarios the
//! original system's test suite exercised. Run `demo-server` first.

#[path = "common.rs"]
mod common;

use rpcd::client::Client;

fn main() -> Result<(), rpcd::Error> {
    tracing_subscriber::fmt().init();

    let addr = "127.0.0.1:9000".parse().expect("valid socket address");
    let mut client = Client::connect(addr)?;
    let procs = common::procedures();

    client.call(procs.do_hash, 1998u32);
    client.flush()?;
    let hashed: Vec<u32> = client.collect()?;
    println!("DoHash(1998) = {}", hashed[0]);

    client.call(procs.guess, 0xc0defefeu32);
    client.flush()?;
    let guessed: Vec<String> = client.collect()?;
    println!("Guess(0xc0defefe) = {:?}", guessed[0]);

    client.call(procs.repeat, ("WIN".to_owned(), 10u32));
    client.flush()?;
    let repeated: Vec<String> = client.collect()?;
    println!("Repeat(\"WIN\", 10) = {}", repeated[0]);

    client.call(procs.test_sign, (-1i32, 0xFFFF_FFFFu32));
    client.flush()?;
    let signed: Vec<u64> = client.collect()?;
    println!("TestSign(-1, 0xFFFFFFFF) = {:#x}", signed[0]);

    client.call(procs.get, "K".to_owned());
    client.flush()?;
    let before: Vec<String> = client.collect()?;
    println!("Get(\"K\") before Put = {:?}", before[0]);

    client.call(procs.put, ("K".to_owned(), "Wall".to_owned()));
    client.flush()?;
    let _: Vec<()> = client.collect()?;

    client.call(procs.get, "K".to_owned());
    client.flush()?;
    let after: Vec<String> = client.collect()?;
    println!("Get(\"K\") after Put = {:?}", after[0]);

    client.call(procs.initialize, ());
    client.flush()?;
    let _: Vec<()> = client.collect()?;

    client.call(procs.check_initialized, ());
    client.flush()?;
    let initialized: Vec<bool> = client.collect()?;
    println!("CheckInitialized() = {}", initialized[0]);

    Ok(())
}
