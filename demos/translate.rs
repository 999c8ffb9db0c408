use gpu_ptr_translator::client::{DEFAULT_DEVICE_PATH, TranslatorClient};
use gpu_ptr_translator::config::ServiceConfig;
use gpu_ptr_translator::utils::align_down;
use std::env;
use std::io;

fn parse_u64(arg: &str) -> io::Result<u64> {
    let parsed = match arg.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{arg}: {e}")))
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        let prog = args.first().map_or("translate", String::as_str);
        eprintln!("usage: {prog} <gpu-vaddr> <length> [dmabuf-fd]");
        return Err(io::Error::from(io::ErrorKind::InvalidInput));
    }
    let vaddr = parse_u64(&args[1])?;
    let length = parse_u64(&args[2])?;

    println!("[+] Opening {DEFAULT_DEVICE_PATH}...");
    let dev = match TranslatorClient::open() {
        Ok(dev) => dev,
        Err(e) => {
            eprintln!("[-] Failed to open {DEFAULT_DEVICE_PATH}: {e}");
            eprintln!("    (Ensure the translator module and 'amdgpu' are loaded)");
            return Err(e.into());
        }
    };

    let translation = match args.get(3) {
        Some(fd) => {
            let fd: i32 = fd
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{fd}: {e}")))?;
            dev.dmabuf_get_pages(vaddr, length, fd)?
        }
        None => dev.get_pages(vaddr, length)?,
    };

    println!("    GPU VA:        0x{vaddr:016x} (len: 0x{length:x})");
    println!("    DMA Address:   0x{:016x}", translation.paddr);
    println!("    Segments:      {}", translation.nents);

    // The page-map interface wants a page-aligned address.
    let page = align_down(vaddr, ServiceConfig::default().page_size());
    match dev.read_pagemap_entry(page) {
        Ok(pme) => println!(
            "    Pagemap:       0x{:016x} (frame 0x{:x}, present: {})",
            pme.0,
            pme.frame(),
            pme.is_present()
        ),
        Err(e) => println!("    Pagemap:       unavailable ({e})"),
    }

    Ok(())
}
