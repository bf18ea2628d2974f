//! Small TFLite flatbuffers shaped like the leaf classifier, built in memory.

use flatbuffers::{FlatBufferBuilder, UnionWIPOffset, WIPOffset};
use gv_core::INPUT_SHAPE;
use tract_core::prelude::f16;
use tract_tflite::tflite as schema;

use schema::{BuiltinOperator, BuiltinOptions, TensorType};

pub const WEIGHTS: [[f32; 3]; 4] = [
    [0.5, 0.0, 0.0],
    [0.0, 0.25, 0.0],
    [0.0, 0.0, 2.0],
    [1.0, 1.0, 1.0],
];
pub const BIAS: [f32; 4] = [0.125, -0.5, 0.0, 1.5];

/// Storage of the dense layer's constants.
#[derive(Debug, Clone, Copy)]
pub enum Weights {
    Float32,
    /// FLOAT16 constants behind `DEQUANTIZE`, as float16 quantization writes them.
    Float16,
}

/// `scores = WEIGHTS · mean(image over H, W) + BIAS`, image (1, 256, 256, 3), scores (1, 4).
pub fn classifier(weights: Weights) -> Vec<u8> {
    classifier_with_input(&INPUT_SHAPE, weights)
}

pub fn classifier_with_input(input_shape: &[usize], weights: Weights) -> Vec<u8> {
    let mut b = Builder::new();
    let image = b.tensor("image", input_shape, TensorType::FLOAT32, 0);
    let axes = b.constant("mean/axes", &[2], TensorType::INT32, &le_bytes(&[1i32, 2], i32::to_le_bytes));
    let pooled = b.tensor("pooled", &[1, 3], TensorType::FLOAT32, 0);
    let kernel: Vec<f32> = WEIGHTS.iter().flatten().copied().collect();
    let kernel = b.weights("dense/kernel", &[4, 3], &kernel, weights);
    let bias = b.weights("dense/bias", &[4], &BIAS, weights);
    let scores = b.tensor("scores", &[1, 4], TensorType::FLOAT32, 0);

    let reducer = schema::ReducerOptions::create(
        &mut b.fbb,
        &schema::ReducerOptionsArgs { keep_dims: false },
    );
    b.operator(
        BuiltinOperator::MEAN,
        &[image, axes],
        &[pooled],
        BuiltinOptions::ReducerOptions,
        Some(reducer.as_union_value()),
    );
    let dense = schema::FullyConnectedOptions::create(
        &mut b.fbb,
        &schema::FullyConnectedOptionsArgs::default(),
    );
    b.operator(
        BuiltinOperator::FULLY_CONNECTED,
        &[pooled, kernel, bias],
        &[scores],
        BuiltinOptions::FullyConnectedOptions,
        Some(dense.as_union_value()),
    );
    b.finish(&[image], &[scores])
}

fn le_bytes<T: Copy, const N: usize>(values: &[T], to_bytes: fn(T) -> [u8; N]) -> Vec<u8> {
    values.iter().flat_map(|v| to_bytes(*v)).collect()
}

struct Builder<'a> {
    fbb: FlatBufferBuilder<'a>,
    tensors: Vec<WIPOffset<schema::Tensor<'a>>>,
    buffers: Vec<WIPOffset<schema::Buffer<'a>>>,
    codes: Vec<BuiltinOperator>,
    operators: Vec<WIPOffset<schema::Operator<'a>>>,
}

impl<'a> Builder<'a> {
    fn new() -> Self {
        let mut fbb = FlatBufferBuilder::new();
        // buffer 0 is the empty sentinel
        let sentinel = schema::Buffer::create(&mut fbb, &schema::BufferArgs { data: None });
        Self {
            fbb,
            tensors: Vec::new(),
            buffers: vec![sentinel],
            codes: Vec::new(),
            operators: Vec::new(),
        }
    }

    fn tensor(&mut self, name: &str, shape: &[usize], type_: TensorType, buffer: u32) -> i32 {
        let shape: Vec<i32> = shape.iter().map(|d| *d as i32).collect();
        let shape = self.fbb.create_vector(&shape);
        let name = self.fbb.create_string(name);
        let tensor = schema::Tensor::create(
            &mut self.fbb,
            &schema::TensorArgs {
                shape: Some(shape),
                type_,
                buffer,
                name: Some(name),
                ..Default::default()
            },
        );
        self.tensors.push(tensor);
        (self.tensors.len() - 1) as i32
    }

    fn constant(&mut self, name: &str, shape: &[usize], type_: TensorType, data: &[u8]) -> i32 {
        let data = self.fbb.create_vector(data);
        let buffer = schema::Buffer::create(&mut self.fbb, &schema::BufferArgs { data: Some(data) });
        self.buffers.push(buffer);
        let buffer = (self.buffers.len() - 1) as u32;
        self.tensor(name, shape, type_, buffer)
    }

    fn weights(&mut self, name: &str, shape: &[usize], values: &[f32], storage: Weights) -> i32 {
        match storage {
            Weights::Float32 => self.constant(
                name,
                shape,
                TensorType::FLOAT32,
                &le_bytes(values, f32::to_le_bytes),
            ),
            Weights::Float16 => {
                let half: Vec<u8> = values
                    .iter()
                    .flat_map(|v| f16::from_f32(*v).to_bits().to_le_bytes())
                    .collect();
                let half = self.constant(&format!("{name}/fp16"), shape, TensorType::FLOAT16, &half);
                let dequantized = self.tensor(name, shape, TensorType::FLOAT32, 0);
                self.operator(
                    BuiltinOperator::DEQUANTIZE,
                    &[half],
                    &[dequantized],
                    BuiltinOptions::NONE,
                    None,
                );
                dequantized
            }
        }
    }

    fn operator(
        &mut self,
        code: BuiltinOperator,
        inputs: &[i32],
        outputs: &[i32],
        options_type: BuiltinOptions,
        options: Option<WIPOffset<UnionWIPOffset>>,
    ) {
        let opcode_index = match self.codes.iter().position(|c| *c == code) {
            Some(ix) => ix,
            None => {
                self.codes.push(code);
                self.codes.len() - 1
            }
        } as u32;
        let inputs = self.fbb.create_vector(inputs);
        let outputs = self.fbb.create_vector(outputs);
        let op = schema::Operator::create(
            &mut self.fbb,
            &schema::OperatorArgs {
                opcode_index,
                inputs: Some(inputs),
                outputs: Some(outputs),
                builtin_options_type: options_type,
                builtin_options: options,
                ..Default::default()
            },
        );
        self.operators.push(op);
    }

    fn finish(mut self, inputs: &[i32], outputs: &[i32]) -> Vec<u8> {
        let mut codes = Vec::new();
        for code in self.codes.clone() {
            codes.push(schema::OperatorCode::create(
                &mut self.fbb,
                &schema::OperatorCodeArgs {
                    deprecated_builtin_code: code.0 as i8,
                    custom_code: None,
                    version: 1,
                    builtin_code: code,
                },
            ));
        }
        let codes = self.fbb.create_vector(&codes);
        let tensors = self.fbb.create_vector(&self.tensors);
        let operators = self.fbb.create_vector(&self.operators);
        let inputs = self.fbb.create_vector(inputs);
        let outputs = self.fbb.create_vector(outputs);
        let name = self.fbb.create_string("main");
        let subgraph = schema::SubGraph::create(
            &mut self.fbb,
            &schema::SubGraphArgs {
                tensors: Some(tensors),
                inputs: Some(inputs),
                outputs: Some(outputs),
                operators: Some(operators),
                name: Some(name),
            },
        );
        let subgraphs = self.fbb.create_vector(&[subgraph]);
        let buffers = self.fbb.create_vector(&self.buffers);
        let model = schema::Model::create(
            &mut self.fbb,
            &schema::ModelArgs {
                version: 3,
                operator_codes: Some(codes),
                subgraphs: Some(subgraphs),
                buffers: Some(buffers),
                ..Default::default()
            },
        );
        schema::finish_model_buffer(&mut self.fbb, model);
        self.fbb.finished_data().to_vec()
    }
}
