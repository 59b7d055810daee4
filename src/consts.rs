// Naming conventions recognized in the disassembly stream
pub const DUMMY_PREFIX: &str = "__stack_check_dummy__";
pub const VECTOR_PREFIX: &str = "__vector_";

/// Label of the synthetic node aggregating all interrupt vectors
pub const INTERRUPT_ROOT: &str = "INTERRUPT";

pub const DEFAULT_OBJDUMP: &str = "arm-none-eabi-objdump";

/// Bytes the call instruction itself pushes (return address), added to
/// every compiler-reported frame size
pub const DEFAULT_CALL_COST: u64 = 4;
