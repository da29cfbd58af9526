use std::borrow::Cow;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectParams, Detector, DetectorSpec};
use crate::detect::result::{Detection, DetectionResult};
use crate::frame::Frame;

/// Overlap above which the weaker of two boxes is suppressed.
const NMS_IOU: f32 = 0.45;

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Tract-based detector for ONNX object-detection models.
///
/// Frames are resized to the model input inside `predict`; the annotated frame
/// keeps its original size. Only YOLOv8-style outputs (`[1, 4 + classes,
/// anchors]`) are supported; any other shape is an inference error. Boxes are
/// labelled with COCO class names when the model has 80 classes and with
/// `class N` otherwise.
pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if width == 0 || height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    pub fn from_spec(spec: &DetectorSpec) -> Result<Self> {
        if let Some(device) = spec.device.as_deref() {
            if device != "cpu" {
                log::warn!("tract runs on the CPU; ignoring device '{}'", device);
            }
        }
        let (width, height) = spec.input_size;
        Self::new(&spec.model_path, width, height)
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.to_rgb_image()?;
        let image = image::imageops::resize(&image, self.width, self.height, FilterType::Triangle);
        let pixels = image.as_raw();
        let width = self.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn run(&self, frame: &Frame, conf: f32) -> Result<DetectionResult> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let scores: Vec<f32> = view.iter().copied().collect();
        decode_output(&shape, &scores, (self.width, self.height), conf)
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn predict(&mut self, mut frame: Frame, params: &DetectParams) -> Result<Frame> {
        let result = self.run(&frame, params.conf)?;
        result.draw_onto(&mut frame, params.conf);
        Ok(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::solid(self.width, self.height, [0, 0, 0]);
        self.run(&blank, 1.0).map(|_| ())
    }
}

fn decode_output(
    shape: &[usize],
    scores: &[f32],
    input: (u32, u32),
    conf: f32,
) -> Result<DetectionResult> {
    match *shape {
        [1, rows, anchors] if rows > 4 && scores.len() == rows * anchors => {
            Ok(decode_yolo(rows, anchors, scores, input, conf))
        }
        _ => Err(anyhow!(
            "unsupported model output shape {:?} (expected [1, 4 + classes, anchors])",
            shape
        )),
    }
}

fn class_label(class_id: usize, classes: usize) -> Cow<'static, str> {
    if classes == COCO_CLASSES.len() {
        Cow::Borrowed(COCO_CLASSES[class_id])
    } else {
        Cow::Owned(format!("class {}", class_id))
    }
}

fn decode_yolo(
    rows: usize,
    anchors: usize,
    scores: &[f32],
    (in_w, in_h): (u32, u32),
    conf: f32,
) -> DetectionResult {
    let classes = rows - 4;
    let at = |row: usize, anchor: usize| scores[row * anchors + anchor];
    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, best) = (0..classes)
            .map(|class| (class, at(4 + class, anchor)))
            .fold((0, f32::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        if !(best >= conf) {
            continue;
        }
        let (cx, cy) = (at(0, anchor), at(1, anchor));
        let (w, h) = (at(2, anchor), at(3, anchor));
        candidates.push(Detection {
            x: (cx - w / 2.0) / in_w as f32,
            y: (cy - h / 2.0) / in_h as f32,
            w: w / in_w as f32,
            h: h / in_h as f32,
            confidence: best,
            class_id: Some(class_id),
            label: class_label(class_id, classes),
        });
    }
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    // Suppression is per class: overlapping boxes of different classes both survive.
    let mut kept: Vec<Detection> = Vec::new();
    for cand in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && iou(k, &cand) >= NMS_IOU);
        if !suppressed {
            kept.push(cand);
        }
    }
    let confidence = kept.first().map(|d| d.confidence).unwrap_or(0.0);
    DetectionResult {
        detections: kept,
        confidence,
    }
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);
    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.w * a.h + b.w * b.h - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
