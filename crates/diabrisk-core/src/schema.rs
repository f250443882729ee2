/// Arrow schema and field contract for the Pima diabetes table.
///
/// Prediction input, the base dataset and the increment file all share this
/// layout. Column names and order are fixed; every ingress point checks them
/// against [`FEATURES`](pima::FEATURES) and [`LABEL`](pima::LABEL).
pub mod pima {
    use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
    use std::sync::Arc;

    use crate::SchemaError;

    /// Number of feature columns (everything except the label).
    pub const FEATURE_COUNT: usize = 8;

    /// Name of the binary label column.
    pub const LABEL: &str = "Outcome";

    /// Storage type of a feature column.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FeatureKind {
        /// Whole-number count or measurement, stored as Int64.
        Integer,
        /// Continuous measurement, stored as Float64.
        Continuous,
    }

    impl FeatureKind {
        pub fn data_type(self) -> DataType {
            match self {
                Self::Integer => DataType::Int64,
                Self::Continuous => DataType::Float64,
            }
        }
    }

    /// One feature column: name, storage type and the input form's bounds.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct FeatureSpec {
        pub name: &'static str,
        pub kind: FeatureKind,
        pub min: f64,
        pub max: f64,
        pub default: f64,
    }

    impl FeatureSpec {
        const fn integer(name: &'static str, max: f64, default: f64) -> Self {
            Self {
                name,
                kind: FeatureKind::Integer,
                min: 0.0,
                max,
                default,
            }
        }

        const fn continuous(name: &'static str, max: f64, default: f64) -> Self {
            Self {
                name,
                kind: FeatureKind::Continuous,
                min: 0.0,
                max,
                default,
            }
        }

        /// Clamp a value into the form bounds.
        pub fn clamp(&self, value: f64) -> f64 {
            value.clamp(self.min, self.max)
        }

        pub fn field(&self) -> Field {
            Field::new(self.name, self.kind.data_type(), false)
        }
    }

    /// The eight feature columns, in storage order.
    pub const FEATURES: [FeatureSpec; FEATURE_COUNT] = [
        FeatureSpec::integer("Pregnancies", 20.0, 1.0),
        FeatureSpec::integer("Glucose", 300.0, 120.0),
        FeatureSpec::integer("BloodPressure", 200.0, 70.0),
        FeatureSpec::integer("SkinThickness", 100.0, 20.0),
        FeatureSpec::integer("Insulin", 900.0, 80.0),
        FeatureSpec::continuous("BMI", 70.0, 25.0),
        FeatureSpec::continuous("DiabetesPedigreeFunction", 3.0, 0.5),
        FeatureSpec::integer("Age", 120.0, 30.0),
    ];

    /// Feature column names, in storage order.
    pub fn feature_names() -> [&'static str; FEATURE_COUNT] {
        FEATURES.map(|f| f.name)
    }

    /// Feature columns followed by the label: the on-disk header.
    pub fn column_names() -> Vec<&'static str> {
        let mut names = feature_names().to_vec();
        names.push(LABEL);
        names
    }

    /// Schema for unlabelled prediction input.
    pub fn feature_schema() -> Schema {
        Schema::new(FEATURES.iter().map(FeatureSpec::field).collect::<Vec<_>>())
    }

    /// Schema for labelled rows (base dataset and increment file).
    pub fn labelled_schema() -> Schema {
        let mut fields: Vec<Field> = FEATURES.iter().map(FeatureSpec::field).collect();
        fields.push(Field::new(LABEL, DataType::Int64, false));
        Schema::new(fields)
    }

    pub fn labelled_schema_ref() -> SchemaRef {
        Arc::new(labelled_schema())
    }

    /// Check a delimited-file header against the labelled column list.
    pub fn validate_header(found: &[&str]) -> Result<(), SchemaError> {
        let expected = column_names();
        if found.len() == expected.len() && found.iter().zip(&expected).all(|(a, b)| a == b) {
            return Ok(());
        }
        Err(SchemaError::Header {
            expected: expected.join(","),
            found: found.join(","),
        })
    }

    /// Check an ordered list of feature names against [`FEATURES`].
    pub fn validate_feature_names(found: &[&str]) -> Result<(), SchemaError> {
        if found.len() != FEATURE_COUNT {
            return Err(SchemaError::FieldCount {
                expected: FEATURE_COUNT,
                found: found.len(),
            });
        }
        for (position, (name, spec)) in found.iter().zip(FEATURES.iter()).enumerate() {
            if *name != spec.name {
                return Err(SchemaError::FieldName {
                    position,
                    expected: spec.name,
                    found: name.to_string(),
                });
            }
        }
        Ok(())
    }
}
