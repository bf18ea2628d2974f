use gv_core::{
    ClassScore, DiseaseClass, Error, InputTensor, ModelHandle, OutputScores, Prediction, Result,
};

/// Run `input` through `handle` and label the scores as percentages, in fixed class order.
pub fn predict(handle: &dyn ModelHandle, input: &InputTensor) -> Result<Prediction> {
    if let Some(expected) = handle.input_shape() {
        if expected != input.shape() {
            return Err(Error::ShapeMismatch {
                expected: expected.to_vec(),
                actual: input.shape().to_vec(),
            });
        }
    }

    let output = handle.invoke(input)?;
    let scores = first_row(&output)?;
    label_scores(scores)
}

/// Strip the batch dimension, keeping only the first sample.
pub fn first_row(output: &OutputScores) -> Result<&[f32]> {
    let width = match output.shape.as_slice() {
        [] => return Err(Error::Inference("model returned a scalar".to_string())),
        [width] => *width,
        [0, ..] => return Err(Error::Inference("model returned an empty batch".to_string())),
        [_, rest @ ..] => rest.iter().product(),
    };

    output.values.get(..width).ok_or_else(|| {
        Error::Inference(format!(
            "output shape {:?} doesn't match its {} values",
            output.shape,
            output.values.len()
        ))
    })
}

pub fn label_scores(scores: &[f32]) -> Result<Prediction> {
    if scores.len() != DiseaseClass::ALL.len() {
        return Err(Error::OutputWidth {
            expected: DiseaseClass::ALL.len(),
            actual: scores.len(),
        });
    }

    let predictions = DiseaseClass::ALL
        .iter()
        .zip(scores)
        .map(|(label, score)| ClassScore {
            label: *label,
            percentage: score * 100.0,
        })
        .collect();
    Ok(Prediction { predictions })
}
