use fixed_arena::{DefaultArena, TOTAL_CAPACITY};
use tracing_subscriber::EnvFilter;

fn outcome(success: bool) -> &'static str {
  if success { "Success" } else { "Failed" }
}

fn main() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  // The whole arena lives inline; nothing below touches the heap allocator
  // on behalf of the arena.
  let arena = DefaultArena::new();

  println!("=== Memory Allocator Test ===");

  // --------------------------------------------------------------------
  // 1) Allocate blocks of different sizes.
  // --------------------------------------------------------------------
  let a = arena.allocate(128);
  println!("Allocating 128 bytes... {}", outcome(a.is_ok()));

  let b = arena.allocate(1024);
  println!("Allocating 1024 bytes... {}", outcome(b.is_ok()));

  let c = arena.allocate(4096);
  println!("Allocating 4096 bytes... {}", outcome(c.is_ok()));

  // --------------------------------------------------------------------
  // 2) Use the allocated memory.
  // --------------------------------------------------------------------
  if let Some(ptr) = a.ok().and_then(|a| arena.as_ptr(a)) {
    let first = ptr.as_ptr() as *mut i32;
    unsafe {
      first.write(42);
      println!("First value in 'a' set to {}", first.read());
    }
  }

  // --------------------------------------------------------------------
  // 3) Free one block and reallocate into its gap.
  // --------------------------------------------------------------------
  println!("Freeing 1024 bytes block...");
  if let Ok(b) = b {
    arena.deallocate(b);
  }

  let d = arena.allocate(512);
  println!("Allocating 512 bytes... {}", outcome(d.is_ok()));
  if let (Ok(b), Ok(d)) = (b, d) {
    println!(
      "512 bytes block reused the freed gap? {}",
      if d.offset() == b.offset() { "Yes" } else { "No" }
    );
  }

  // --------------------------------------------------------------------
  // 4) Free all remaining allocations.
  // --------------------------------------------------------------------
  println!("Freeing all memory...");
  for block in [a, d, c].into_iter().flatten() {
    arena.deallocate(block);
  }

  // --------------------------------------------------------------------
  // 5) Allocate the whole arena now that everything is free.
  // --------------------------------------------------------------------
  println!("Allocating 100 KB ({TOTAL_CAPACITY} bytes)...");
  let big_block = arena.allocate_ptr(TOTAL_CAPACITY as isize);
  println!("100 KB allocation {}", outcome(big_block.is_some()));

  // --------------------------------------------------------------------
  // 6) Any further allocation must fail while the big block is held.
  // --------------------------------------------------------------------
  let fail_block = arena.allocate_ptr(512);
  println!(
    "Attempting 512 bytes allocation after big block... {} (expected: Failed)",
    outcome(fail_block.is_some())
  );

  if let Some(ptr) = fail_block {
    arena.deallocate_ptr(ptr.as_ptr());
  }

  // --------------------------------------------------------------------
  // 7) Free the big block.
  // --------------------------------------------------------------------
  if let Some(ptr) = big_block {
    arena.deallocate_ptr(ptr.as_ptr());
    println!("Freed 100 KB block.");
  }

  println!("=== Test Complete ===");
}
