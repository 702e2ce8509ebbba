use std::ptr;
use std::slice;

use tagalloc::heap::globals::{tacheck, tainit, tateardown};
use tagalloc::heap::tadelloc::tadelloc;
use tagalloc::heap::talloc::talloc;
use tagalloc::heap::tarealloc::tarealloc;

fn main() {
    if !tainit() {
        eprintln!("heap setup failed");
        return;
    }

    let message = b"Hello World!";

    let word = talloc(message.len()).unwrap();
    println!("Word address: {:p}", word);

    unsafe {
        ptr::copy_nonoverlapping(message.as_ptr(), word, message.len());
        let stored = slice::from_raw_parts(word, message.len());
        println!("Word value: {}", String::from_utf8_lossy(stored));
    }

    /* grow the block, the message must survive the move */
    let word = unsafe { tarealloc(word, 64) }.unwrap();
    println!("Word address after realloc: {:p}", word);

    unsafe {
        let stored = slice::from_raw_parts(word, message.len());
        println!("Word value after realloc: {}", String::from_utf8_lossy(stored));
    }

    println!("Heap errors reported: {}", tacheck(true));

    unsafe {
        tadelloc(word);
    }
    tateardown();
}
