//! Tiny ONNX graphs encoded by hand so the tract path can run in tests.
//!
//! The graph is `Softmax(MatMul(ReduceMean(x, axes=[1,2]), w))`: per-channel
//! means of the NHWC input pushed through a `[3, width]` weight matrix.

use std::io::Write;

use tempfile::NamedTempFile;

/// Minimal protobuf writer; fields are emitted in call order.
#[derive(Default)]
struct Pb(Vec<u8>);

impl Pb {
    fn varint(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.0.push(byte);
                break;
            }
            self.0.push(byte | 0x80);
        }
    }

    fn key(&mut self, field: u64, wire: u64) {
        self.varint((field << 3) | wire);
    }

    fn int(mut self, field: u64, v: i64) -> Self {
        self.key(field, 0);
        self.varint(v as u64);
        self
    }

    fn bytes(mut self, field: u64, b: &[u8]) -> Self {
        self.key(field, 2);
        self.varint(b.len() as u64);
        self.0.extend_from_slice(b);
        self
    }

    fn str(self, field: u64, s: &str) -> Self {
        self.bytes(field, s.as_bytes())
    }

    fn msg(self, field: u64, m: Pb) -> Self {
        self.bytes(field, &m.0)
    }
}

const FLOAT: i64 = 1;
const ATTR_INT: i64 = 2;
const ATTR_INTS: i64 = 7;

fn value_info(name: &str, dims: &[i64]) -> Pb {
    let shape = dims
        .iter()
        .fold(Pb::default(), |shape, &d| shape.msg(1, Pb::default().int(1, d)));
    let tensor = Pb::default().int(1, FLOAT).msg(2, shape);
    Pb::default().str(1, name).msg(2, Pb::default().msg(1, tensor))
}

fn node(op: &str, inputs: &[&str], output: &str, attrs: Vec<Pb>) -> Pb {
    let mut node = inputs.iter().fold(Pb::default(), |n, i| n.str(1, i));
    node = node.str(2, output).str(3, output).str(4, op);
    attrs.into_iter().fold(node, |n, a| n.msg(5, a))
}

fn attr_int(name: &str, v: i64) -> Pb {
    Pb::default().str(1, name).int(3, v).int(20, ATTR_INT)
}

fn attr_ints(name: &str, vs: &[i64]) -> Pb {
    vs.iter()
        .fold(Pb::default().str(1, name), |a, &v| a.int(8, v))
        .int(20, ATTR_INTS)
}

fn initializer(name: &str, dims: &[i64], values: &[f32]) -> Pb {
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    dims.iter()
        .fold(Pb::default(), |t, &d| t.int(1, d))
        .int(2, FLOAT)
        .str(8, name)
        .bytes(9, &raw)
}

/// Serialised model taking `[1,224,224,3]` and returning `[1, width]` probabilities.
///
/// `weights` is row-major `[3, width]`: row `c` maps channel `c` to the classes.
pub fn channel_mean_model(width: usize, weights: &[f32]) -> Vec<u8> {
    assert_eq!(weights.len(), 3 * width, "weights must be [3, width]");
    let width = width as i64;

    let graph = Pb::default()
        .msg(
            1,
            node(
                "ReduceMean",
                &["x"],
                "means",
                vec![attr_ints("axes", &[1, 2]), attr_int("keepdims", 0)],
            ),
        )
        .msg(1, node("MatMul", &["means", "w"], "logits", vec![]))
        .msg(
            1,
            node("Softmax", &["logits"], "probs", vec![attr_int("axis", 1)]),
        )
        .str(2, "channel_mean")
        .msg(5, initializer("w", &[3, width], weights))
        .msg(11, value_info("x", &[1, 224, 224, 3]))
        .msg(12, value_info("probs", &[1, width]));

    Pb::default()
        .int(1, 7)
        .str(2, "fixtures")
        .msg(7, graph)
        .msg(8, Pb::default().str(1, "").int(2, 13))
        .0
}

/// Four classes: red picks class 0, green class 1, blue class 2, and class 3
/// follows overall brightness.
pub fn four_class_model() -> Vec<u8> {
    #[rustfmt::skip]
    let weights = [
        1.0, 0.0, 0.0, 0.5,
        0.0, 1.0, 0.0, 0.5,
        0.0, 0.0, 1.0, 0.5,
    ];
    channel_mean_model(4, &weights)
}

pub fn three_class_model() -> Vec<u8> {
    #[rustfmt::skip]
    let weights = [
        1.0, 0.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
    ];
    channel_mean_model(3, &weights)
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp model file");
    file.write_all(bytes).expect("write temp model");
    file.flush().expect("flush temp model");
    file
}
