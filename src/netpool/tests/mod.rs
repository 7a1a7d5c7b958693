//! Allocator behaviour over mocked usage sources.
