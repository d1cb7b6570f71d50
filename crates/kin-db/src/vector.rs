//! Conversion between [`kin_common::Embedding`] and the `pgvector::Vector`
//! wire type sqlx binds directly to a Postgres `vector` column.

use kin_common::Embedding;
use pgvector::Vector;

pub fn to_pgvector(embedding: &Embedding) -> Vector {
    Vector::from(embedding.as_slice().to_vec())
}

pub fn from_pgvector(vector: Vector) -> Embedding {
    Embedding::new(vector.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_pgvector() {
        let original = Embedding::new(vec![0.1, 0.2, 0.3]);
        let converted = from_pgvector(to_pgvector(&original));
        assert_eq!(original, converted);
    }
}
