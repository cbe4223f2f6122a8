//! Point and query checks against a collection's declared vector spaces.

use std::collections::BTreeMap;

use vector_types::{Point, VectorParams};

use crate::error::SchemaValidationError;

/// Declared vector spaces of a collection, by name.
pub type Schema = BTreeMap<String, VectorParams>;

/// Check every vector of `point` against `schema`.
///
/// Returns the declared spaces the point does not carry. Those are not an
/// error: the store accepts points with a subset of the named vectors.
pub fn validate_point<'a>(
    collection: &str,
    schema: &'a Schema,
    point: &Point,
) -> Result<Vec<&'a str>, SchemaValidationError> {
    for (name, vector) in &point.vectors {
        let params = schema
            .get(name)
            .ok_or_else(|| SchemaValidationError::UnknownVector {
                collection: collection.to_string(),
                id: point.id,
                name: name.clone(),
            })?;
        if vector.len() != params.size {
            return Err(SchemaValidationError::DimensionMismatch {
                collection: collection.to_string(),
                name: name.clone(),
                expected: params.size,
                actual: vector.len(),
            });
        }
    }

    Ok(schema
        .keys()
        .filter(|name| !point.vectors.contains_key(*name))
        .map(String::as_str)
        .collect())
}

/// Check a query vector of length `len` against the space `vector_name`.
pub fn validate_query<'a>(
    collection: &str,
    schema: &'a Schema,
    vector_name: &str,
    len: usize,
) -> Result<&'a VectorParams, SchemaValidationError> {
    let params = schema
        .get(vector_name)
        .ok_or_else(|| SchemaValidationError::UnknownCollectionVector {
            collection: collection.to_string(),
            name: vector_name.to_string(),
        })?;
    if len != params.size {
        return Err(SchemaValidationError::DimensionMismatch {
            collection: collection.to_string(),
            name: vector_name.to_string(),
            expected: params.size,
            actual: len,
        });
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_types::Distance;

    fn schema() -> Schema {
        Schema::from([
            ("image".to_string(), VectorParams::new(4, Distance::Cosine)),
            ("text".to_string(), VectorParams::new(2, Distance::Dot)),
        ])
    }

    #[test]
    fn test_valid_point_reports_missing_spaces() {
        let schema = schema();
        let point = Point::new(1).with_vector("image", vec![0.0; 4]);
        let missing = validate_point("c", &schema, &point).unwrap();
        assert_eq!(missing, vec!["text"]);
    }

    #[test]
    fn test_unknown_vector() {
        let schema = schema();
        let point = Point::new(7).with_vector("audio", vec![0.0; 4]);
        let err = validate_point("c", &schema, &point).unwrap_err();
        assert_eq!(
            err,
            SchemaValidationError::UnknownVector {
                collection: "c".to_string(),
                id: 7,
                name: "audio".to_string(),
            }
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let schema = schema();
        let point = Point::new(1)
            .with_vector("image", vec![0.0; 4])
            .with_vector("text", vec![0.0; 3]);
        let err = validate_point("c", &schema, &point).unwrap_err();
        assert!(matches!(
            err,
            SchemaValidationError::DimensionMismatch { expected: 2, actual: 3, .. }
        ));
    }

    #[test]
    fn test_validate_query() {
        let schema = schema();
        assert_eq!(
            validate_query("c", &schema, "image", 4).unwrap().distance,
            Distance::Cosine
        );
        assert!(matches!(
            validate_query("c", &schema, "image", 5),
            Err(SchemaValidationError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            validate_query("c", &schema, "video", 4),
            Err(SchemaValidationError::UnknownCollectionVector { .. })
        ));
    }
}
