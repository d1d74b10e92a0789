//! Smoke-test client for ferry-fs, speaking the wire protocol by hand

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

fn send_line(stream: &mut BufReader<TcpStream>, line: &str) {
    let sock = stream.get_mut();
    sock.write_all(line.as_bytes()).unwrap();
    sock.write_all(b"\n").unwrap();
}

fn recv_line(stream: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    stream.read_line(&mut line).unwrap();
    line.trim_end_matches(['\r', '\n']).to_string()
}

fn main() {
    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:3002".to_string());
    let sock = TcpStream::connect(&addr).expect("Failed to connect");
    // One reader for lines and payload alike
    let mut stream = BufReader::new(sock);
    println!("Connected to ferry-fs at {addr}");

    // Test 1: list
    println!("\n=== Test: list ===");
    send_line(&mut stream, "list");
    let count: usize = recv_line(&mut stream).parse().unwrap();
    println!("list: {count} files");
    for _ in 0..count {
        println!("  {}", recv_line(&mut stream));
    }

    // Test 2: upload
    println!("\n=== Test: upload smoke.txt ===");
    let payload = b"ferry smoke test\n";
    send_line(&mut stream, &format!("upload smoke.txt {}", payload.len()));
    stream.get_mut().write_all(payload).unwrap();
    println!("upload: {}", recv_line(&mut stream));

    // Test 3: download it back
    println!("\n=== Test: download smoke.txt ===");
    send_line(&mut stream, "download smoke.txt");
    let status = recv_line(&mut stream);
    let size: usize = status.strip_prefix("OK ").expect("download refused").parse().unwrap();
    let mut data = vec![0u8; size];
    stream.read_exact(&mut data).unwrap();
    assert_eq!(data, payload, "round trip mismatch");
    println!("download: {size} bytes, content matches");

    // Test 4: unknown command
    println!("\n=== Test: frobnicate ===");
    send_line(&mut stream, "frobnicate");
    println!("expected error: {}", recv_line(&mut stream));

    // Test 5: delete
    println!("\n=== Test: delete smoke.txt ===");
    send_line(&mut stream, "delete smoke.txt");
    println!("delete: {}", recv_line(&mut stream));

    send_line(&mut stream, "quit");
    println!("\n=== All tests passed ===");
}
