use quick_error::quick_error;

quick_error! {
    /// The error taxonomy surfaced at the engine boundary.
    ///
    /// None of these are retried internally, and none of them indicate a
    /// bug in the engine itself — they are expected outcomes of the
    /// operation contracts in the crate's top-level documentation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        /// The caller supplied an empty key.
        EmptyKey {
            display("key must not be empty")
        }
        /// The key is absent, tombstoned, or past its expiration.
        NotFound {
            display("key not found")
        }
        /// The stored value's shape does not match the shape the
        /// operation asked for.
        InvalidType {
            display("value does not have the requested shape")
        }
        /// A list index or dict field was out of range / absent.
        InvalidIndex {
            display("index or field does not exist")
        }
    }
}
