/// TraverseOptions configures a single traversal.
/// All options are independent of one another, and every combination is valid.
///
/// Options deserialize from their camelCase names, and unknown keys are ignored:
///
/// ```
/// use schema_traverse::TraverseOptions;
///
/// let options: TraverseOptions =
///     serde_json::from_str(r#"{"skipFirstMutation": true, "bfs": true, "other": 1}"#).unwrap();
///
/// assert_eq!(
///     options,
///     TraverseOptions {
///         skip_first_mutation: true,
///         bfs: true,
///         ..Default::default()
///     }
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraverseOptions {
    /// Don't transform the root schema, unless a descendant cycles back to it.
    pub skip_first_mutation: bool,
    /// Recursively merge the output of the transform into the schema,
    /// rather than replacing the schema with it.
    pub merge_not_mutate: bool,
    /// Rewrite schemas in place. If false, every visited schema is copied
    /// into a new node and original nodes are left untouched.
    pub mutable: bool,
    /// Transform each schema before its children (pre-order),
    /// rather than after them (post-order).
    pub bfs: bool,
}

#[cfg(test)]
mod test {
    use super::TraverseOptions;

    #[test]
    fn test_options_from_config() {
        let options: TraverseOptions = serde_json::from_value(serde_json::json!({
            "mergeNotMutate": true,
            "mutable": true,
        }))
        .unwrap();

        assert!(options.merge_not_mutate && options.mutable);
        assert!(!options.skip_first_mutation && !options.bfs);

        insta::assert_json_snapshot!(TraverseOptions::default(), @r###"
        {
          "skipFirstMutation": false,
          "mergeNotMutate": false,
          "mutable": false,
          "bfs": false
        }
        "###);
    }
}
