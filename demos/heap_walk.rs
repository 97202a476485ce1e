use std::{io::Read, ptr};

use kralloc::{Config, Growth, Heap, OsHeap, Placement, UNIT};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `gdb`, or just to follow how the program break and free list change.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the heap end and every free block in list order.
fn print_heap(
  label: &str,
  heap: &mut Heap<OsHeap>,
) {
  println!(
    "[{}] PID = {}, heap end = {:?}, {:?}",
    label,
    std::process::id(),
    heap.heap_end(),
    heap.stats(),
  );
  for block in heap.free_blocks() {
    println!("    free {:#x} .. {:#x} ({} units)", block.addr, block.end(), block.units);
  }
}

fn main() {
  let growth = match std::env::args().nth(1).as_deref() {
    Some("mmap") => Growth::PageMapped,
    _ => Growth::Contiguous,
  };
  let config = Config::new()
    .with_growth(growth)
    .with_placement(Placement::FirstFit);
  let mut heap = Heap::new(OsHeap::new(growth), config);

  print_heap("start", &mut heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) The first allocation grows the heap and seeds the free list.
  // --------------------------------------------------------------------
  let first = heap.allocate(4).unwrap();
  unsafe { (first.as_ptr() as *mut u32).write(0xDEADBEEF) };
  println!("\n[1] Allocated 4 bytes at {:?} ({} usable)", first, unsafe {
    heap.usable_size(first)
  });
  print_heap("1", &mut heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Three neighbors, carved off the tail of the same free block.
  // --------------------------------------------------------------------
  let a = heap.allocate(3 * UNIT).unwrap();
  let b = heap.allocate(5 * UNIT).unwrap();
  let c = heap.allocate(2 * UNIT).unwrap();
  unsafe { ptr::write_bytes(b.as_ptr(), 0xAB, 5 * UNIT) };
  println!("\n[2] a = {:?}, b = {:?}, c = {:?}", a, b, c);
  print_heap("2", &mut heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free a and c: c folds into the remainder below it, a stays a
  //    separate hole because b sits between them.
  // --------------------------------------------------------------------
  unsafe {
    heap.deallocate(a.as_ptr());
    heap.deallocate(c.as_ptr());
  }
  println!("\n[3] Freed a and c");
  print_heap("3", &mut heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free b: it bridges both holes into a single free block.
  // --------------------------------------------------------------------
  unsafe { heap.deallocate(b.as_ptr()) };
  println!("\n[4] Freed b");
  print_heap("4", &mut heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Resize the first block; its contents move with it.
  // --------------------------------------------------------------------
  let moved = unsafe { heap.reallocate(first.as_ptr(), 64) }.unwrap();
  println!(
    "\n[5] Reallocated {:?} -> {:?}, value = 0x{:X}",
    first,
    moved,
    unsafe { (moved.as_ptr() as *const u32).read() }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) A request larger than the free list forces another extent.
  // --------------------------------------------------------------------
  let big = heap.allocate(64 * 1024).unwrap();
  println!("\n[6] Allocated 64 KiB at {:?}", big);
  print_heap("6", &mut heap);
  block_until_enter_pressed();

  println!("\n[7] End of example. Extents are never returned; the OS reclaims them at exit.");
}
