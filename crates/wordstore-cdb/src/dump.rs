//! Human-readable text dump of a record set.
//!
//! Each record becomes `+klen,vlen:key->value` followed by a newline, and
//! the dump ends with one empty line. Keys and values are written as raw
//! bytes, so a dump round-trips through `cdbmake`-style tools unchanged.

use std::io::{self, Write};

/// Write `entries` in dump format.
pub fn write_dump<W, I, K, V>(out: &mut W, entries: I) -> io::Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    for (key, value) in entries {
        let (key, value) = (key.as_ref(), value.as_ref());
        write!(out, "+{},{}:", key.len(), value.len())?;
        out.write_all(key)?;
        out.write_all(b"->")?;
        out.write_all(value)?;
        out.write_all(b"\n")?;
    }
    out.write_all(b"\n")
}

/// Render `entries` in dump format into a buffer.
pub fn dump_to_vec<I, K, V>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_dump(&mut out, entries);
    out
}
