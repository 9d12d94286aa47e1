use crate::types::word::{self, Word};
use crate::virtual_machine::errors::VMError;
use std::fmt;

/// Default maximum number of items on the operand stack.
pub const MAX_STACK_DEPTH: usize = 1024;

/// Bounded operand stack of [`Word`]s.
///
/// The top of the stack is the most recently pushed item. Index 0 in
/// [`peek`](Stack::peek) and [`swap`](Stack::swap) refers to the top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stack {
    items: Vec<Word>,
    max_depth: usize,
}

impl Stack {
    /// Creates an empty stack with the default depth limit.
    pub fn new() -> Self {
        Self::with_max_depth(MAX_STACK_DEPTH)
    }

    /// Creates an empty stack holding at most `max_depth` items.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_depth.min(MAX_STACK_DEPTH)),
            max_depth,
        }
    }

    /// Pushes `value` on top.
    ///
    /// Returns [`VMError::StackOverflow`] if the stack is already full.
    pub fn push(&mut self, value: Word) -> Result<(), VMError> {
        if self.items.len() >= self.max_depth {
            return Err(VMError::StackOverflow {
                max_depth: self.max_depth,
            });
        }
        self.items.push(value);
        Ok(())
    }

    /// Pushes a big-endian value of up to 32 bytes.
    ///
    /// Returns [`VMError::InvalidStackItem`] for wider inputs.
    pub fn push_be_bytes(&mut self, bytes: &[u8]) -> Result<(), VMError> {
        let value =
            word::from_be_slice(bytes).ok_or(VMError::InvalidStackItem { len: bytes.len() })?;
        self.push(value)
    }

    /// Removes and returns the top item.
    pub fn pop(&mut self) -> Result<Word, VMError> {
        self.items.pop().ok_or(VMError::StackUnderflow {
            requested: 1,
            depth: 0,
        })
    }

    /// Returns the item `index` positions below the top without removing it.
    pub fn peek(&self, index: usize) -> Result<Word, VMError> {
        let depth = self.items.len();
        if index >= depth {
            return Err(VMError::StackUnderflow {
                requested: index + 1,
                depth,
            });
        }
        Ok(self.items[depth - 1 - index])
    }

    /// Exchanges the top item with the one `index` positions below it.
    ///
    /// `swap(0)` is a no-op on a non-empty stack.
    pub fn swap(&mut self, index: usize) -> Result<(), VMError> {
        let depth = self.items.len();
        if index >= depth {
            return Err(VMError::StackUnderflow {
                requested: index + 1,
                depth,
            });
        }
        self.items.swap(depth - 1, depth - 1 - index);
        Ok(())
    }

    /// Number of items currently on the stack.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Items from bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Word> {
        self.items.iter()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Stack {
    /// Bottom-to-top list of hex values, e.g. `[0x01, 0x2a]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", word::to_hex(*item))?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: u64) -> Word {
        Word::from(v)
    }

    fn stack_of(values: &[u64]) -> Stack {
        let mut stack = Stack::new();
        for v in values {
            stack.push(w(*v)).unwrap();
        }
        stack
    }

    #[test]
    fn push_then_pop() {
        let mut stack = Stack::new();
        stack.push(Word::MAX).unwrap();
        assert_eq!(stack.pop().unwrap(), Word::MAX);
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_empty_underflows() {
        let mut stack = Stack::new();
        assert!(matches!(
            stack.pop(),
            Err(VMError::StackUnderflow { depth: 0, .. })
        ));
    }

    #[test]
    fn overflow_at_max_depth() {
        let mut stack = Stack::new();
        for i in 0..MAX_STACK_DEPTH {
            stack.push(w(i as u64)).unwrap();
        }
        assert!(matches!(
            stack.push(w(0)),
            Err(VMError::StackOverflow { max_depth: 1024 })
        ));
        assert_eq!(stack.len(), MAX_STACK_DEPTH);
    }

    #[test]
    fn custom_depth() {
        let mut stack = Stack::with_max_depth(1);
        stack.push(w(1)).unwrap();
        assert!(matches!(
            stack.push(w(2)),
            Err(VMError::StackOverflow { max_depth: 1 })
        ));
    }

    #[test]
    fn peek_from_top() {
        let stack = stack_of(&[1, 2, 3]);
        assert_eq!(stack.peek(0).unwrap(), w(3));
        assert_eq!(stack.peek(2).unwrap(), w(1));
        assert!(matches!(
            stack.peek(3),
            Err(VMError::StackUnderflow {
                requested: 4,
                depth: 3
            })
        ));
        assert!(Stack::new().peek(0).is_err());
    }

    #[test]
    fn swap_one_and_two() {
        let mut stack = stack_of(&[1, 2, 3]);
        stack.swap(1).unwrap();
        assert_eq!(stack.to_string(), "[0x01, 0x03, 0x02]");
        stack.swap(2).unwrap();
        assert_eq!(stack.to_string(), "[0x02, 0x03, 0x01]");
    }

    #[test]
    fn swap_zero_is_noop() {
        let mut stack = stack_of(&[7]);
        stack.swap(0).unwrap();
        assert_eq!(stack.peek(0).unwrap(), w(7));
    }

    #[test]
    fn swap_underflow() {
        let mut stack = stack_of(&[1]);
        assert!(stack.swap(1).is_err());
        assert!(Stack::new().swap(0).is_err());
    }

    #[test]
    fn push_be_bytes_validates_width() {
        let mut stack = Stack::new();
        stack.push_be_bytes(&[0x42, 0x43]).unwrap();
        assert_eq!(stack.pop().unwrap(), w(0x4243));
        assert!(matches!(
            stack.push_be_bytes(&[0u8; 33]),
            Err(VMError::InvalidStackItem { len: 33 })
        ));
    }
}
