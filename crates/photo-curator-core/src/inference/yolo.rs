//! `YOLOv8` object detection network.
//!
//! Backbone (`DarkNet` with C2f blocks and SPPF), FPN neck and anchor-free
//! detection head with distribution focal loss decoding. Weight names follow
//! the `net.*` / `fpn.*` / `head.*` layout of the safetensors exports published
//! for candle.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use anyhow::Result;
use candle_core::{DType, IndexOp, Module, Tensor, D};
use candle_nn::{batch_norm, conv2d, conv2d_no_bias, Conv2d, Conv2dConfig, VarBuilder};

/// Width/depth scaling of a `YOLOv8` variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multiples {
    depth: f64,
    width: f64,
    ratio: f64,
}

impl Multiples {
    /// Nano variant.
    #[must_use]
    pub const fn n() -> Self {
        Self {
            depth: 0.33,
            width: 0.25,
            ratio: 2.0,
        }
    }

    /// Small variant.
    #[must_use]
    pub const fn s() -> Self {
        Self {
            depth: 0.33,
            width: 0.50,
            ratio: 2.0,
        }
    }

    /// Medium variant.
    #[must_use]
    pub const fn m() -> Self {
        Self {
            depth: 0.67,
            width: 0.75,
            ratio: 1.5,
        }
    }

    /// Large variant.
    #[must_use]
    pub const fn l() -> Self {
        Self {
            depth: 1.00,
            width: 1.00,
            ratio: 1.0,
        }
    }

    /// Extra-large variant.
    #[must_use]
    pub const fn x() -> Self {
        Self {
            depth: 1.00,
            width: 1.25,
            ratio: 1.0,
        }
    }

    fn filters(self) -> (usize, usize, usize) {
        let f1 = (256.0 * self.width) as usize;
        let f2 = (512.0 * self.width) as usize;
        let f3 = (512.0 * self.width * self.ratio) as usize;
        (f1, f2, f3)
    }

    fn channels(self, base: f64) -> usize {
        (base * self.width) as usize
    }

    fn repeats(self, base: f64) -> usize {
        (base * self.depth).round() as usize
    }
}

struct Upsample {
    scale_factor: usize,
}

impl Module for Upsample {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (_, _, h, w) = xs.dims4()?;
        xs.upsample_nearest2d(self.scale_factor * h, self.scale_factor * w)
    }
}

/// Convolution with batch norm folded in, followed by `SiLU`.
struct ConvBlock {
    conv: Conv2d,
}

impl ConvBlock {
    fn new(
        vb: &VarBuilder,
        c1: usize,
        c2: usize,
        kernel: usize,
        stride: usize,
        padding: Option<usize>,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: padding.unwrap_or(kernel / 2),
            stride,
            ..Conv2dConfig::default()
        };
        let bn = batch_norm(c2, 1e-3, vb.pp("bn"))?;
        let conv = conv2d_no_bias(c1, c2, kernel, cfg, vb.pp("conv"))?.absorb_bn(&bn)?;
        Ok(Self { conv })
    }
}

impl Module for ConvBlock {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.conv.forward(xs)?.silu()
    }
}

struct Bottleneck {
    cv1: ConvBlock,
    cv2: ConvBlock,
    residual: bool,
}

impl Bottleneck {
    fn new(vb: &VarBuilder, c1: usize, c2: usize, shortcut: bool) -> Result<Self> {
        let cv1 = ConvBlock::new(&vb.pp("cv1"), c1, c2, 3, 1, None)?;
        let cv2 = ConvBlock::new(&vb.pp("cv2"), c2, c2, 3, 1, None)?;
        Ok(Self {
            cv1,
            cv2,
            residual: c1 == c2 && shortcut,
        })
    }
}

impl Module for Bottleneck {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.cv2.forward(&self.cv1.forward(xs)?)?;
        if self.residual {
            xs + ys
        } else {
            Ok(ys)
        }
    }
}

/// CSP bottleneck with two convolutions.
struct C2f {
    cv1: ConvBlock,
    cv2: ConvBlock,
    bottlenecks: Vec<Bottleneck>,
}

impl C2f {
    fn new(vb: &VarBuilder, c1: usize, c2: usize, n: usize, shortcut: bool) -> Result<Self> {
        let c = c2 / 2;
        let cv1 = ConvBlock::new(&vb.pp("cv1"), c1, 2 * c, 1, 1, None)?;
        let cv2 = ConvBlock::new(&vb.pp("cv2"), (2 + n) * c, c2, 1, 1, None)?;
        let bottlenecks = (0..n)
            .map(|i| Bottleneck::new(&vb.pp(format!("bottleneck.{i}")), c, c, shortcut))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cv1,
            cv2,
            bottlenecks,
        })
    }
}

impl Module for C2f {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut ys = self.cv1.forward(xs)?.chunk(2, 1)?;
        for bottleneck in &self.bottlenecks {
            let last = ys[ys.len() - 1].clone();
            ys.push(bottleneck.forward(&last)?);
        }
        self.cv2.forward(&Tensor::cat(&ys, 1)?)
    }
}

/// Spatial pyramid pooling, fast variant.
struct Sppf {
    cv1: ConvBlock,
    cv2: ConvBlock,
    kernel: usize,
}

impl Sppf {
    fn new(vb: &VarBuilder, c1: usize, c2: usize, kernel: usize) -> Result<Self> {
        let hidden = c1 / 2;
        let cv1 = ConvBlock::new(&vb.pp("cv1"), c1, hidden, 1, 1, None)?;
        let cv2 = ConvBlock::new(&vb.pp("cv2"), hidden * 4, c2, 1, 1, None)?;
        Ok(Self { cv1, cv2, kernel })
    }

    fn pool(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let pad = self.kernel / 2;
        xs.pad_with_same(2, pad, pad)?
            .pad_with_same(3, pad, pad)?
            .max_pool2d_with_stride(self.kernel, 1)
    }
}

impl Module for Sppf {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.cv1.forward(xs)?;
        let p1 = self.pool(&xs)?;
        let p2 = self.pool(&p1)?;
        let p3 = self.pool(&p2)?;
        self.cv2.forward(&Tensor::cat(&[&xs, &p1, &p2, &p3], 1)?)
    }
}

/// Distribution focal loss integral: turns per-side bin logits into distances.
struct Dfl {
    conv: Conv2d,
    bins: usize,
}

impl Dfl {
    fn new(vb: &VarBuilder, bins: usize) -> Result<Self> {
        let conv = conv2d_no_bias(bins, 1, 1, Conv2dConfig::default(), vb.pp("conv"))?;
        Ok(Self { conv, bins })
    }
}

impl Module for Dfl {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (b, _, anchors) = xs.dims3()?;
        let xs = xs.reshape((b, 4, self.bins, anchors))?.transpose(2, 1)?;
        let xs = candle_nn::ops::softmax(&xs, 1)?;
        self.conv.forward(&xs)?.reshape((b, 4, anchors))
    }
}

struct DarkNet {
    b1_0: ConvBlock,
    b1_1: ConvBlock,
    b2_0: C2f,
    b2_1: ConvBlock,
    b2_2: C2f,
    b3_0: ConvBlock,
    b3_1: C2f,
    b4_0: ConvBlock,
    b4_1: C2f,
    b5: Sppf,
}

impl DarkNet {
    fn new(vb: &VarBuilder, m: Multiples) -> Result<Self> {
        let c64 = m.channels(64.0);
        let c128 = m.channels(128.0);
        let c256 = m.channels(256.0);
        let c512 = m.channels(512.0);
        let c512r = (512.0 * m.width * m.ratio) as usize;

        Ok(Self {
            b1_0: ConvBlock::new(&vb.pp("b1.0"), 3, c64, 3, 2, Some(1))?,
            b1_1: ConvBlock::new(&vb.pp("b1.1"), c64, c128, 3, 2, Some(1))?,
            b2_0: C2f::new(&vb.pp("b2.0"), c128, c128, m.repeats(3.0), true)?,
            b2_1: ConvBlock::new(&vb.pp("b2.1"), c128, c256, 3, 2, Some(1))?,
            b2_2: C2f::new(&vb.pp("b2.2"), c256, c256, m.repeats(6.0), true)?,
            b3_0: ConvBlock::new(&vb.pp("b3.0"), c256, c512, 3, 2, Some(1))?,
            b3_1: C2f::new(&vb.pp("b3.1"), c512, c512, m.repeats(6.0), true)?,
            b4_0: ConvBlock::new(&vb.pp("b4.0"), c512, c512r, 3, 2, Some(1))?,
            b4_1: C2f::new(&vb.pp("b4.1"), c512r, c512r, m.repeats(3.0), true)?,
            b5: Sppf::new(&vb.pp("b5.0"), c512r, c512r, 5)?,
        })
    }

    /// Returns the stride 8, 16 and 32 feature maps.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        let x1 = self.b1_1.forward(&self.b1_0.forward(xs)?)?;
        let x2 = self
            .b2_2
            .forward(&self.b2_1.forward(&self.b2_0.forward(&x1)?)?)?;
        let x3 = self.b3_1.forward(&self.b3_0.forward(&x2)?)?;
        let x4 = self.b4_1.forward(&self.b4_0.forward(&x3)?)?;
        let x5 = self.b5.forward(&x4)?;
        Ok((x2, x3, x5))
    }
}

struct Neck {
    up: Upsample,
    n1: C2f,
    n2: C2f,
    n3: ConvBlock,
    n4: C2f,
    n5: ConvBlock,
    n6: C2f,
}

impl Neck {
    fn new(vb: &VarBuilder, m: Multiples) -> Result<Self> {
        let n = m.repeats(3.0);
        let c256 = m.channels(256.0);
        let c512 = m.channels(512.0);
        let c768 = m.channels(768.0);
        let c512r = (512.0 * m.width * m.ratio) as usize;
        let c512_1r = (512.0 * m.width * (1.0 + m.ratio)) as usize;

        Ok(Self {
            up: Upsample { scale_factor: 2 },
            n1: C2f::new(&vb.pp("n1"), c512_1r, c512, n, false)?,
            n2: C2f::new(&vb.pp("n2"), c768, c256, n, false)?,
            n3: ConvBlock::new(&vb.pp("n3"), c256, c256, 3, 2, Some(1))?,
            n4: C2f::new(&vb.pp("n4"), c768, c512, n, false)?,
            n5: ConvBlock::new(&vb.pp("n5"), c512, c512, 3, 2, Some(1))?,
            n6: C2f::new(&vb.pp("n6"), c512_1r, c512r, n, false)?,
        })
    }

    fn forward(
        &self,
        p3: &Tensor,
        p4: &Tensor,
        p5: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        let x = self
            .n1
            .forward(&Tensor::cat(&[&self.up.forward(p5)?, p4], 1)?)?;
        let head_1 = self
            .n2
            .forward(&Tensor::cat(&[&self.up.forward(&x)?, p3], 1)?)?;
        let head_2 = self
            .n4
            .forward(&Tensor::cat(&[&self.n3.forward(&head_1)?, &x], 1)?)?;
        let head_3 = self
            .n6
            .forward(&Tensor::cat(&[&self.n5.forward(&head_2)?, p5], 1)?)?;
        Ok((head_1, head_2, head_3))
    }
}

/// Anchor centers (in grid units) and per-anchor strides for the three scales.
fn make_anchors(
    features: [&Tensor; 3],
    strides: [usize; 3],
    offset: f64,
) -> candle_core::Result<(Tensor, Tensor)> {
    let device = features[0].device();
    let mut anchor_points = Vec::with_capacity(3);
    let mut stride_tensor = Vec::with_capacity(3);

    for (xs, stride) in features.into_iter().zip(strides) {
        let (_, _, h, w) = xs.dims4()?;
        let sx = (Tensor::arange(0, w as u32, device)?.to_dtype(DType::F32)? + offset)?;
        let sy = (Tensor::arange(0, h as u32, device)?.to_dtype(DType::F32)? + offset)?;
        let sx = sx.reshape((1, w))?.repeat((h, 1))?.flatten_all()?;
        let sy = sy.reshape((h, 1))?.repeat((1, w))?.flatten_all()?;
        anchor_points.push(Tensor::stack(&[&sx, &sy], D::Minus1)?);
        stride_tensor.push((Tensor::ones(h * w, DType::F32, device)? * stride as f64)?);
    }

    let anchor_points = Tensor::cat(&anchor_points, 0)?;
    let stride_tensor = Tensor::cat(&stride_tensor, 0)?.unsqueeze(1)?;
    Ok((anchor_points, stride_tensor))
}

/// Converts left/top/right/bottom distances to center-size boxes.
fn dist2bbox(distance: &Tensor, anchor_points: &Tensor) -> candle_core::Result<Tensor> {
    let chunks = distance.chunk(2, 1)?;
    let x1y1 = anchor_points.broadcast_sub(&chunks[0])?;
    let x2y2 = anchor_points.broadcast_add(&chunks[1])?;
    let center = ((&x1y1 + &x2y2)? * 0.5)?;
    let size = (&x2y2 - &x1y1)?;
    Tensor::cat(&[center, size], 1)
}

struct HeadBranch {
    block0: ConvBlock,
    block1: ConvBlock,
    conv: Conv2d,
}

impl HeadBranch {
    fn new(vb: &VarBuilder, c_in: usize, c_hidden: usize, c_out: usize) -> Result<Self> {
        Ok(Self {
            block0: ConvBlock::new(&vb.pp("0"), c_in, c_hidden, 3, 1, None)?,
            block1: ConvBlock::new(&vb.pp("1"), c_hidden, c_hidden, 3, 1, None)?,
            conv: conv2d(c_hidden, c_out, 1, Conv2dConfig::default(), vb.pp("2"))?,
        })
    }
}

impl Module for HeadBranch {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.block0.forward(xs)?;
        let xs = self.block1.forward(&xs)?;
        self.conv.forward(&xs)
    }
}

/// Bins per box side in the DFL regression.
const DFL_BINS: usize = 16;

struct DetectionHead {
    dfl: Dfl,
    box_branches: Vec<HeadBranch>,
    cls_branches: Vec<HeadBranch>,
    outputs: usize,
}

impl DetectionHead {
    fn new(vb: &VarBuilder, num_classes: usize, filters: (usize, usize, usize)) -> Result<Self> {
        let dfl = Dfl::new(&vb.pp("dfl"), DFL_BINS)?;
        let c_cls = filters.0.max(num_classes.min(100));
        let c_box = (filters.0 / 4).max(DFL_BINS * 4);

        let mut box_branches = Vec::with_capacity(3);
        let mut cls_branches = Vec::with_capacity(3);
        for (i, filter) in [filters.0, filters.1, filters.2].into_iter().enumerate() {
            box_branches.push(HeadBranch::new(
                &vb.pp(format!("cv2.{i}")),
                filter,
                c_box,
                4 * DFL_BINS,
            )?);
            cls_branches.push(HeadBranch::new(
                &vb.pp(format!("cv3.{i}")),
                filter,
                c_cls,
                num_classes,
            )?);
        }

        Ok(Self {
            dfl,
            box_branches,
            cls_branches,
            outputs: num_classes + DFL_BINS * 4,
        })
    }

    fn forward(&self, features: [&Tensor; 3]) -> candle_core::Result<Tensor> {
        let mut maps = Vec::with_capacity(3);
        for (i, xs) in features.into_iter().enumerate() {
            let boxes = self.box_branches[i].forward(xs)?;
            let classes = self.cls_branches[i].forward(xs)?;
            maps.push(Tensor::cat(&[&boxes, &classes], 1)?);
        }

        let (anchors, strides) = make_anchors([&maps[0], &maps[1], &maps[2]], [8, 16, 32], 0.5)?;
        let anchors = anchors.transpose(0, 1)?.unsqueeze(0)?;
        let strides = strides.transpose(0, 1)?;

        let flattened = maps
            .iter()
            .map(|xs| {
                let b = xs.dim(0)?;
                let el = xs.elem_count();
                xs.reshape((b, self.outputs, el / (b * self.outputs)))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let x_cat = Tensor::cat(&flattened, 2)?;

        let box_logits = x_cat.i((.., ..DFL_BINS * 4))?;
        let cls_logits = x_cat.i((.., DFL_BINS * 4..))?;
        let dbox = dist2bbox(&self.dfl.forward(&box_logits)?, &anchors)?;
        let dbox = dbox.broadcast_mul(&strides)?;
        Tensor::cat(&[dbox, candle_nn::ops::sigmoid(&cls_logits)?], 1)
    }
}

/// `YOLOv8` detection model.
pub struct YoloV8 {
    net: DarkNet,
    fpn: Neck,
    head: DetectionHead,
}

impl YoloV8 {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has an unexpected shape.
    pub fn new(vb: &VarBuilder, multiples: Multiples, num_classes: usize) -> Result<Self> {
        Ok(Self {
            net: DarkNet::new(&vb.pp("net"), multiples)?,
            fpn: Neck::new(&vb.pp("fpn"), multiples)?,
            head: DetectionHead::new(&vb.pp("head"), num_classes, multiples.filters())?,
        })
    }
}

impl Module for YoloV8 {
    /// Input `(B, 3, H, W)` with H and W multiples of 32; output
    /// `(B, 4 + classes, anchors)` with boxes as center/size in input pixels.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (p3, p4, p5) = self.net.forward(xs)?;
        let (h1, h2, h3) = self.fpn.forward(&p3, &p4, &p5)?;
        self.head.forward([&h1, &h2, &h3])
    }
}
