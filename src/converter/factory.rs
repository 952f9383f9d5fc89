use crate::converter::{
    birkhoff, independent_set, labs, marketsplit, network, portfolio, routing, sports, steiner,
    topology, BirkhoffIntegerLinear, IndependentSetBinaryLinear, IndependentSetBinaryUnconstrained,
    LabsInteger, LabsQuadraticUnconstrained, MarketsplitBinaryLinear,
    MarketsplitBinaryUnconstrained, NetworkIntegerLinear, PortfolioBinaryQuadratic,
    PortfolioQuadraticUnconstrained, RoutingIntegerLinear, SportsMixedIntegerLinear,
    SteinerIntegerLinear, TopologyFlowMip, TopologySeidelLinear, TopologySeidelQuadratic,
};
use crate::domain::converter_service::{ConversionError, ConversionResult, InstanceConverter};
use std::sync::Arc;

/// Factory for creating converters for a (dataset, model) pair
pub struct ConverterFactory;

impl ConverterFactory {
    /// Create the converter that builds `model` instances of `dataset`
    pub fn create(dataset: &str, model: &str) -> ConversionResult<Arc<dyn InstanceConverter>> {
        let converter: Arc<dyn InstanceConverter> = match (dataset, model) {
            (marketsplit::DATASET, "binary_linear") => Arc::new(MarketsplitBinaryLinear::new()),
            (marketsplit::DATASET, "binary_unconstrained") => {
                Arc::new(MarketsplitBinaryUnconstrained::new())
            }
            (labs::DATASET, "integer") => Arc::new(LabsInteger::new()),
            (labs::DATASET, "quadratic_unconstrained") => {
                Arc::new(LabsQuadraticUnconstrained::new())
            }
            (independent_set::DATASET, "binary_linear") => {
                Arc::new(IndependentSetBinaryLinear::new())
            }
            (independent_set::DATASET, "binary_unconstrained") => {
                Arc::new(IndependentSetBinaryUnconstrained::new())
            }
            (birkhoff::DATASET, "integer_linear") => Arc::new(BirkhoffIntegerLinear::new()),
            (steiner::DATASET, "integer_linear") => Arc::new(SteinerIntegerLinear::new()),
            (sports::DATASET, "mixed_integer_linear") => Arc::new(SportsMixedIntegerLinear::new()),
            (portfolio::DATASET, "binary_quadratic") => Arc::new(PortfolioBinaryQuadratic::new()),
            (portfolio::DATASET, "quadratic_unconstrained") => {
                Arc::new(PortfolioQuadraticUnconstrained::new())
            }
            (network::DATASET, "integer_linear") => Arc::new(NetworkIntegerLinear::new()),
            (routing::DATASET, "integer_linear") => Arc::new(RoutingIntegerLinear::new()),
            (topology::DATASET, "flow_mip") => Arc::new(TopologyFlowMip::new()),
            (topology::DATASET, "seidel_linear") => Arc::new(TopologySeidelLinear::new()),
            (topology::DATASET, "seidel_quadratic") => Arc::new(TopologySeidelQuadratic::new()),
            _ => {
                return Err(ConversionError::Unsupported {
                    dataset: dataset.to_string(),
                    model: model.to_string(),
                })
            }
        };
        Ok(converter)
    }

    /// All (dataset, model) pairs with a converter
    pub fn supported() -> Vec<(&'static str, &'static str)> {
        vec![
            (marketsplit::DATASET, "binary_linear"),
            (marketsplit::DATASET, "binary_unconstrained"),
            (labs::DATASET, "integer"),
            (labs::DATASET, "quadratic_unconstrained"),
            (independent_set::DATASET, "binary_linear"),
            (independent_set::DATASET, "binary_unconstrained"),
            (birkhoff::DATASET, "integer_linear"),
            (steiner::DATASET, "integer_linear"),
            (sports::DATASET, "mixed_integer_linear"),
            (portfolio::DATASET, "binary_quadratic"),
            (portfolio::DATASET, "quadratic_unconstrained"),
            (network::DATASET, "integer_linear"),
            (routing::DATASET, "integer_linear"),
            (topology::DATASET, "flow_mip"),
            (topology::DATASET, "seidel_linear"),
            (topology::DATASET, "seidel_quadratic"),
        ]
    }
}
