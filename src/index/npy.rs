//! NumPy `.npy` codec for the embedding matrix.
//!
//! Reads format versions 1.0 to 3.0 holding a C-ordered 2-D array of 4- or
//! 8-byte floats in either byte order. Writes format 1.0, little-endian f32.

use std::fs;
use std::path::Path;

use super::{EmbeddingMatrix, IndexError, IndexResult};

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32Le,
    F32Be,
    F64Le,
    F64Be,
}

impl Dtype {
    fn parse(descr: &str) -> IndexResult<Self> {
        match descr {
            "<f4" | "|f4" | "=f4" => Ok(Dtype::F32Le),
            ">f4" => Ok(Dtype::F32Be),
            "<f8" | "|f8" | "=f8" => Ok(Dtype::F64Le),
            ">f8" => Ok(Dtype::F64Be),
            other => Err(format_error(format!("unsupported dtype '{}'", other))),
        }
    }

    fn item_size(self) -> usize {
        match self {
            Dtype::F32Le | Dtype::F32Be => 4,
            Dtype::F64Le | Dtype::F64Be => 8,
        }
    }

    fn decode(self, chunk: &[u8]) -> f32 {
        match self {
            Dtype::F32Le => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            Dtype::F32Be => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            Dtype::F64Le => f64::from_le_bytes(eight(chunk)) as f32,
            Dtype::F64Be => f64::from_be_bytes(eight(chunk)) as f32,
        }
    }
}

fn eight(chunk: &[u8]) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&chunk[..8]);
    bytes
}

fn format_error(msg: impl Into<String>) -> IndexError {
    IndexError::MatrixFormatError(msg.into())
}

/// Read an embedding matrix from an `.npy` file.
pub fn read_matrix(path: &Path) -> IndexResult<EmbeddingMatrix> {
    let bytes = fs::read(path)
        .map_err(|e| IndexError::IoError(format!("{}: {}", path.display(), e)))?;
    decode(&bytes).map_err(|e| match e {
        IndexError::MatrixFormatError(msg) => {
            IndexError::MatrixFormatError(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Write an embedding matrix to an `.npy` file.
pub fn write_matrix(path: &Path, matrix: &EmbeddingMatrix) -> IndexResult<()> {
    fs::write(path, encode(matrix))
        .map_err(|e| IndexError::IoError(format!("{}: {}", path.display(), e)))
}

/// Decode the bytes of an `.npy` file.
pub fn decode(bytes: &[u8]) -> IndexResult<EmbeddingMatrix> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(format_error("missing NUMPY magic string"));
    }

    let major = bytes[MAGIC.len()];
    let (header_len, header_start) = match major {
        1 => {
            let at = MAGIC.len() + 2;
            let raw = bytes.get(at..at + 2).ok_or_else(|| format_error("truncated header"))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, at + 2)
        }
        2 | 3 => {
            let at = MAGIC.len() + 2;
            let raw = bytes.get(at..at + 4).ok_or_else(|| format_error("truncated header"))?;
            (u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize, at + 4)
        }
        other => return Err(format_error(format!("unsupported format version {}", other))),
    };

    let header_bytes = bytes
        .get(header_start..header_start + header_len)
        .ok_or_else(|| format_error("truncated header"))?;
    let header = std::str::from_utf8(header_bytes)
        .map_err(|_| format_error("header is not valid text"))?;

    let descr = header_value(header, "descr")?;
    let dtype = Dtype::parse(descr.trim_matches(|c| c == '\'' || c == '"'))?;
    if header_value(header, "fortran_order")? != "False" {
        return Err(format_error("Fortran-ordered arrays are not supported"));
    }
    let (rows, dim) = parse_shape(&header_value(header, "shape")?)?;

    let payload = &bytes[header_start + header_len..];
    let expected = rows
        .checked_mul(dim)
        .and_then(|items| items.checked_mul(dtype.item_size()))
        .ok_or_else(|| format_error("shape overflows"))?;
    if payload.len() != expected {
        return Err(format_error(format!(
            "payload holds {} bytes but shape ({}, {}) needs {}",
            payload.len(),
            rows,
            dim,
            expected
        )));
    }

    let data = payload
        .chunks_exact(dtype.item_size())
        .map(|chunk| dtype.decode(chunk))
        .collect();

    EmbeddingMatrix::new(rows, dim, data)
}

/// Encode a matrix as `.npy` bytes (format 1.0, `<f4`).
pub fn encode(matrix: &EmbeddingMatrix) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows(),
        matrix.dim()
    );

    // magic + version + u16 length, then the dict, space padding and '\n'
    let preamble = MAGIC.len() + 2 + 2;
    let unpadded = preamble + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(preamble + header_len + matrix.as_slice().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    for value in matrix.as_slice() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Extract the raw value text for `key` from a header dict literal.
fn header_value(header: &str, key: &str) -> IndexResult<String> {
    let quoted = [format!("'{}'", key), format!("\"{}\"", key)];
    let start = quoted
        .iter()
        .find_map(|k| header.find(k.as_str()).map(|at| at + k.len()))
        .ok_or_else(|| format_error(format!("header has no '{}' entry", key)))?;

    let rest = header[start..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| format_error(format!("malformed '{}' entry", key)))?
        .trim_start();

    let value = if rest.starts_with('(') {
        let end = rest
            .find(')')
            .ok_or_else(|| format_error(format!("unterminated '{}' tuple", key)))?;
        &rest[..=end]
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        &rest[..end]
    };
    Ok(value.trim().to_string())
}

fn parse_shape(shape: &str) -> IndexResult<(usize, usize)> {
    let inner = shape
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format_error(format!("malformed shape '{}'", shape)))?;

    let dims = inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| format_error(format!("malformed shape '{}'", shape)))
        })
        .collect::<IndexResult<Vec<_>>>()?;

    match dims.as_slice() {
        [rows, dim] => Ok((*rows, *dim)),
        [0] => Ok((0, 0)),
        _ => Err(format_error(format!("expected a 2-D array, found shape {}", shape))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npy_bytes(version: u8, dict: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&[version, 0]);
        let header = format!("{}\n", dict);
        if version == 1 {
            out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        } else {
            out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn le_f32(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_numpy_v1_header() {
        let bytes = npy_bytes(
            1,
            "{'descr': '<f4', 'fortran_order': False, 'shape': (2, 3), }",
            &le_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        );
        let matrix = decode(&bytes).unwrap();

        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.dim(), 3);
        assert_eq!(matrix.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_decode_v2_big_endian_f8() {
        let payload: Vec<u8> = [0.5f64, -0.25].iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = npy_bytes(2, "{'descr': '>f8', 'fortran_order': False, 'shape': (1, 2), }", &payload);
        let matrix = decode(&bytes).unwrap();

        assert_eq!(matrix.row(0), &[0.5, -0.25]);
    }

    #[test]
    fn test_decode_empty_one_dimensional() {
        let bytes = npy_bytes(1, "{'descr': '<f4', 'fortran_order': False, 'shape': (0,), }", &[]);
        let matrix = decode(&bytes).unwrap();
        assert_eq!(matrix.rows(), 0);
    }

    #[test]
    fn test_written_file_reads_back() {
        let matrix = EmbeddingMatrix::new(2, 2, vec![0.1, -3.5, f32::MIN_POSITIVE, 7.0]).unwrap();
        let bytes = encode(&matrix);

        let header_end = bytes.iter().position(|&b| b == b'\n').unwrap() + 1;
        assert_eq!(header_end % HEADER_ALIGNMENT, 0);
        assert_eq!(decode(&bytes).unwrap(), matrix);
    }

    #[test]
    fn test_rejects_bad_magic() {
        assert!(matches!(
            decode(b"NOTNUMPY\x01\x00"),
            Err(IndexError::MatrixFormatError(_))
        ));
    }

    #[test]
    fn test_rejects_fortran_order() {
        let bytes = npy_bytes(
            1,
            "{'descr': '<f4', 'fortran_order': True, 'shape': (1, 1), }",
            &le_f32(&[1.0]),
        );
        assert!(matches!(decode(&bytes), Err(IndexError::MatrixFormatError(_))));
    }

    #[test]
    fn test_rejects_three_dimensional_shape() {
        let bytes = npy_bytes(
            1,
            "{'descr': '<f4', 'fortran_order': False, 'shape': (1, 1, 1), }",
            &le_f32(&[1.0]),
        );
        assert!(matches!(decode(&bytes), Err(IndexError::MatrixFormatError(_))));
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let bytes = npy_bytes(
            1,
            "{'descr': '<f4', 'fortran_order': False, 'shape': (2, 2), }",
            &le_f32(&[1.0, 2.0, 3.0]),
        );
        match decode(&bytes) {
            Err(IndexError::MatrixFormatError(msg)) => assert!(msg.contains("payload")),
            other => panic!("Expected MatrixFormatError, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_integer_dtype() {
        let bytes = npy_bytes(1, "{'descr': '<i4', 'fortran_order': False, 'shape': (1, 1), }", &[0; 4]);
        assert!(matches!(decode(&bytes), Err(IndexError::MatrixFormatError(_))));
    }
}
