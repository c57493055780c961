//! Search expression builder.

/// Anatomy and modality terms shared by every query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    pub organ: String,
    pub modality: String,
}

impl Default for QueryTemplate {
    fn default() -> Self {
        Self {
            organ: "(kidney* OR renal)".to_string(),
            modality: "MRI".to_string(),
        }
    }
}

impl QueryTemplate {
    /// Build the search term for one technique expression and publication year.
    pub fn build(&self, expression: &str, year: i32) -> String {
        format!(
            "{} AND {} AND {} AND {}[PDAT]",
            self.organ, expression, self.modality, year
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_techniques;

    #[test]
    fn test_build_default_template() {
        let template = QueryTemplate::default();
        assert_eq!(
            template.build("blood oxygenation level-dependent", 2019),
            "(kidney* OR renal) AND blood oxygenation level-dependent AND MRI AND 2019[PDAT]"
        );
    }

    #[test]
    fn test_build_every_default_technique() {
        let template = QueryTemplate::default();
        for technique in default_techniques() {
            for year in [1989, 2004, 2020] {
                let query = template.build(&technique.expression, year);
                let expected = format!(
                    "(kidney* OR renal) AND {} AND MRI AND {}[PDAT]",
                    technique.expression, year
                );
                assert_eq!(query, expected);
            }
        }
    }

    #[test]
    fn test_build_custom_terms() {
        let template = QueryTemplate {
            organ: "liver".to_string(),
            modality: "CT".to_string(),
        };
        assert_eq!(template.build("perfusion", 2001), "liver AND perfusion AND CT AND 2001[PDAT]");
    }
}
