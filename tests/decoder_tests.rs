/**
 * Decoder Tests
 *
 * Hand-crafted item streams exercising the strict/lax split, forward
 * compatibility with unknown tags and trailing VLQs, placeholders, and
 * index-map offsetting.
 */

#[cfg(test)]
mod tests {
    use sourcemap_scopes_codec::vlq::{encode_signed, encode_unsigned};
    use sourcemap_scopes_codec::{
        decode, encode, Binding, DecodeMode, DecodeOptions, Error, OriginalPosition, Position,
        RangeOptions, SafeScopeInfoBuilder, ScopeInfo, ScopeOptions, SourceMapJson,
        SourceMapSection,
    };

    // Tag values of the wire format, as documented for the scopes field.
    const SCOPE_START: u32 = 0x1;
    const SCOPE_END: u32 = 0x2;
    const SCOPE_VARIABLES: u32 = 0x3;
    const RANGE_START: u32 = 0x5;
    const RANGE_END: u32 = 0x6;
    const RANGE_BINDINGS: u32 = 0x7;
    const RANGE_SUBRANGE_BINDING: u32 = 0x8;
    const RANGE_CALL_SITE: u32 = 0x9;

    /// Builds one encoded item VLQ by VLQ.
    struct Item(String);

    impl Item {
        fn new(tag: u32) -> Self {
            let mut out = String::new();
            encode_unsigned(tag, &mut out);
            Item(out)
        }

        fn u(mut self, value: u32) -> Self {
            encode_unsigned(value, &mut self.0);
            self
        }

        fn s(mut self, value: i32) -> Self {
            encode_signed(value, &mut self.0);
            self
        }
    }

    fn stream(items: &[Item]) -> String {
        items
            .iter()
            .map(|item| item.0.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn map_with(names: &[&str], scopes: &str) -> SourceMapJson {
        SourceMapJson {
            names: Some(names.iter().map(|n| n.to_string()).collect()),
            scopes: Some(scopes.to_string()),
            ..SourceMapJson::default()
        }
    }

    fn lax(map: &SourceMapJson) -> ScopeInfo {
        decode(map, &DecodeOptions::default()).unwrap()
    }

    fn strict(map: &SourceMapJson) -> Result<ScopeInfo, Error> {
        decode(
            map,
            &DecodeOptions {
                mode: DecodeMode::Strict,
                ..DecodeOptions::default()
            },
        )
    }

    mod placeholder_tests {
        use super::*;

        #[test]
        fn should_decode_commas_into_null_placeholders() {
            let map = map_with(&[], ",,");
            assert_eq!(lax(&map).scopes(), &[None, None, None]);

            let map = map_with(&[], ",");
            assert_eq!(lax(&map).scopes(), &[None, None]);
        }

        #[test]
        fn should_decode_an_empty_scopes_string_into_one_placeholder() {
            let map = map_with(&[], "");
            assert_eq!(lax(&map).scopes(), &[None]);
        }

        #[test]
        fn should_append_a_placeholder_for_a_trailing_comma() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_END).u(4).u(0),
            ]) + ",";
            let map = map_with(&[], &encoded);
            let info = lax(&map);
            assert_eq!(info.scopes().len(), 2);
            assert!(info.scopes()[0].is_some());
            assert!(info.scopes()[1].is_none());
        }

        #[test]
        fn should_decode_a_map_without_scopes_as_empty() {
            let map = SourceMapJson::default();
            let info = lax(&map);
            assert!(info.scopes().is_empty());
            assert!(info.ranges().is_empty());
        }
    }

    mod forward_compatibility_tests {
        use super::*;

        fn known_stream() -> String {
            stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_END).u(4).u(0),
            ])
        }

        #[test]
        fn should_skip_unknown_tags_with_arbitrary_payloads() {
            let reference = lax(&map_with(&[], &known_stream()));

            let unknown_items = [
                Item::new(0x4).u(7).s(-2).0,
                Item::new(0xA).0,
                Item::new(0x1F).u(1).u(2).u(3).u(4).u(5).0,
            ];
            for unknown in &unknown_items {
                let before = format!("{},{}", unknown, known_stream());
                let between = {
                    let items = [
                        Item::new(SCOPE_START).u(0).u(0).u(0).0,
                        unknown.clone(),
                        Item::new(SCOPE_END).u(4).u(0).0,
                    ];
                    items.join(",")
                };
                let after = format!("{},{}", known_stream(), unknown);
                for encoded in [before, between, after] {
                    let info = lax(&map_with(&[], &encoded));
                    assert_eq!(info, reference, "stream {encoded:?}");
                    let strict_info = strict(&map_with(&[], &encoded)).unwrap();
                    assert_eq!(strict_info, reference, "strict stream {encoded:?}");
                }
            }
        }

        #[test]
        fn should_ignore_trailing_vlqs_on_scope_items() {
            let reference = lax(&map_with(&[], &known_stream()));
            let padded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0).u(0).u(9),
                Item::new(SCOPE_END).u(4).u(0).u(1),
            ]);
            assert_eq!(lax(&map_with(&[], &padded)), reference);
        }

        #[test]
        fn should_ignore_unknown_flag_bits() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0x40).u(0).u(0),
                Item::new(SCOPE_END).u(4).u(0),
            ]);
            let info = lax(&map_with(&[], &encoded));
            let scope = info.scope(info.scopes()[0].unwrap());
            assert_eq!(scope.name, None);
            assert_eq!(scope.kind, None);
            assert!(!scope.is_stack_frame);
        }

        #[test]
        fn should_still_reject_malformed_vlqs_in_both_modes() {
            // A dangling continuation bit is an input error, not a
            // recoverable condition.
            let map = map_with(&[], "BAAg");
            assert_eq!(
                decode(&map, &DecodeOptions::default()).unwrap_err(),
                Error::UnexpectedEndOfInput
            );
            assert_eq!(strict(&map).unwrap_err(), Error::UnexpectedEndOfInput);
        }
    }

    mod strict_lax_divergence_tests {
        use super::*;

        #[test]
        fn should_diverge_on_an_unmatched_scope_end() {
            let encoded = stream(&[Item::new(SCOPE_END).u(4).u(0)]);
            let map = map_with(&[], &encoded);
            assert_eq!(strict(&map).unwrap_err(), Error::UnmatchedScopeEnd);
            assert!(lax(&map).scopes().is_empty());
        }

        #[test]
        fn should_diverge_on_an_unmatched_range_end() {
            let encoded = stream(&[Item::new(RANGE_END).u(4)]);
            let map = map_with(&[], &encoded);
            assert_eq!(strict(&map).unwrap_err(), Error::UnmatchedRangeEnd);
            assert!(lax(&map).ranges().is_empty());
        }

        #[test]
        fn should_diverge_on_orphan_variables() {
            let encoded = stream(&[Item::new(SCOPE_VARIABLES).s(0)]);
            let map = map_with(&["x"], &encoded);
            assert_eq!(strict(&map).unwrap_err(), Error::OrphanItem("variables"));
            assert!(lax(&map).scopes().is_empty());
        }

        #[test]
        fn should_diverge_on_orphan_bindings() {
            let encoded = stream(&[Item::new(RANGE_BINDINGS).s(0)]);
            let map = map_with(&["x"], &encoded);
            assert_eq!(strict(&map).unwrap_err(), Error::OrphanItem("bindings"));
            assert!(lax(&map).ranges().is_empty());
        }

        #[test]
        fn should_diverge_on_an_orphan_call_site() {
            let encoded = stream(&[Item::new(RANGE_CALL_SITE).s(0).s(1).s(2)]);
            let map = map_with(&[], &encoded);
            assert_eq!(strict(&map).unwrap_err(), Error::OrphanItem("call site"));
            assert!(lax(&map).ranges().is_empty());
        }

        #[test]
        fn should_diverge_on_an_unclosed_scope() {
            let encoded = stream(&[Item::new(SCOPE_START).u(0).u(0).u(0)]);
            let map = map_with(&[], &encoded);
            assert_eq!(strict(&map).unwrap_err(), Error::UnclosedAtEndOfInput);
            assert!(lax(&map).scopes().is_empty());
        }

        #[test]
        fn should_diverge_on_an_out_of_bounds_name_index() {
            // HAS_NAME with a delta landing on index 1 while names = ["foo"].
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0x1).u(0).u(0).s(1),
                Item::new(SCOPE_END).u(1).u(0),
            ]);
            let map = map_with(&["foo"], &encoded);

            let error = strict(&map).unwrap_err();
            assert_eq!(error, Error::NamesIndexOutOfBounds { index: 1, len: 1 });
            assert!(error.to_string().contains("names"));

            let info = lax(&map);
            let scope = info.scope(info.scopes()[0].unwrap());
            assert_eq!(scope.name.as_deref(), Some(""));
        }

        #[test]
        fn should_diverge_on_an_out_of_bounds_kind_index() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0x2).u(0).u(0).s(3),
                Item::new(SCOPE_END).u(1).u(0),
            ]);
            let map = map_with(&["foo"], &encoded);
            assert!(matches!(
                strict(&map).unwrap_err(),
                Error::NamesIndexOutOfBounds { index: 3, .. }
            ));
            let info = lax(&map);
            let scope = info.scope(info.scopes()[0].unwrap());
            assert_eq!(scope.kind.as_deref(), Some(""));
        }

        #[test]
        fn should_diverge_on_an_out_of_bounds_variable_index() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_VARIABLES).s(2),
                Item::new(SCOPE_END).u(1).u(0),
            ]);
            let map = map_with(&["x"], &encoded);
            assert!(matches!(
                strict(&map).unwrap_err(),
                Error::NamesIndexOutOfBounds { index: 2, .. }
            ));
            let info = lax(&map);
            let scope = info.scope(info.scopes()[0].unwrap());
            assert_eq!(scope.variables, vec![String::new()]);
        }

        #[test]
        fn should_diverge_on_an_out_of_bounds_binding_index() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_VARIABLES).s(0),
                Item::new(SCOPE_END).u(1).u(0),
                Item::new(RANGE_START).u(0x2).u(0).s(0),
                Item::new(RANGE_BINDINGS).s(99),
                Item::new(RANGE_END).u(5),
            ]);
            let map = map_with(&["x"], &encoded);
            assert!(matches!(
                strict(&map).unwrap_err(),
                Error::NamesIndexOutOfBounds { index: 99, .. }
            ));
            let info = lax(&map);
            let range = info.range(info.ranges()[0]);
            assert_eq!(range.values, vec![Binding::Expression(String::new())]);
        }

        #[test]
        fn should_diverge_on_an_unknown_definition_index() {
            let encoded = stream(&[
                Item::new(RANGE_START).u(0x2).u(0).s(5),
                Item::new(RANGE_END).u(9),
            ]);
            let map = map_with(&[], &encoded);
            assert_eq!(
                strict(&map).unwrap_err(),
                Error::UnknownDefinitionScopeIndex { index: 5 }
            );
            let info = lax(&map);
            let range = info.range(info.ranges()[0]);
            assert_eq!(range.original_scope, None);
            assert_eq!(range.end, Position::new(0, 9));
        }

        #[test]
        fn should_diverge_on_a_duplicate_sub_range_binding() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_VARIABLES).s(0),
                Item::new(SCOPE_END).u(1).u(0),
                Item::new(RANGE_START).u(0x2).u(0).s(0),
                Item::new(RANGE_BINDINGS).s(0),
                Item::new(RANGE_SUBRANGE_BINDING).u(0).s(-1).u(5),
                Item::new(RANGE_SUBRANGE_BINDING).u(0).s(-1).u(0),
                Item::new(RANGE_END).u(9),
            ]);
            let map = map_with(&["x"], &encoded);
            assert_eq!(
                strict(&map).unwrap_err(),
                Error::DuplicateSubRangeBinding { variable: 0 }
            );

            // Lax appends the stalled piece as-is.
            let info = lax(&map);
            let range = info.range(info.ranges()[0]);
            match &range.values[0] {
                Binding::SubRanges(pieces) => {
                    assert_eq!(pieces.len(), 3);
                    assert_eq!(pieces[1].from, pieces[2].from);
                }
                other => panic!("expected sub-ranges, got {other:?}"),
            }
        }

        #[test]
        fn should_diverge_on_a_bindings_count_mismatch() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_VARIABLES).s(0),
                Item::new(SCOPE_END).u(1).u(0),
                Item::new(RANGE_START).u(0x2).u(0).s(0),
                Item::new(RANGE_BINDINGS).s(-1).s(-1),
                Item::new(RANGE_END).u(5),
            ]);
            let map = map_with(&["x"], &encoded);
            assert_eq!(
                strict(&map).unwrap_err(),
                Error::ValuesCountMismatch {
                    values: 2,
                    variables: 1
                }
            );
            let info = lax(&map);
            let range = info.range(info.ranges()[0]);
            assert_eq!(
                range.values,
                vec![Binding::Unavailable, Binding::Unavailable]
            );
        }

        #[test]
        fn should_drop_a_sub_range_binding_for_a_missing_variable_slot() {
            let encoded = stream(&[
                Item::new(RANGE_START).u(0).u(0),
                Item::new(RANGE_SUBRANGE_BINDING).u(3).s(-1).u(5),
                Item::new(RANGE_END).u(9),
            ]);
            let map = map_with(&[], &encoded);
            assert_eq!(
                strict(&map).unwrap_err(),
                Error::VariableIndexOutOfBounds { index: 3, len: 0 }
            );
            let info = lax(&map);
            assert!(info.range(info.ranges()[0]).values.is_empty());
        }
    }

    mod sub_range_decoding_tests {
        use super::*;

        #[test]
        fn should_materialize_piece_boundaries_from_contiguity() {
            let encoded = stream(&[
                Item::new(SCOPE_START).u(0).u(0).u(0),
                Item::new(SCOPE_VARIABLES).s(0),
                Item::new(SCOPE_END).u(9).u(0),
                Item::new(RANGE_START).u(0x2).u(0).s(0),
                Item::new(RANGE_BINDINGS).s(1),
                // One piece break at (2, 7): line delta then absolute column.
                Item::new(RANGE_SUBRANGE_BINDING).u(0).s(2).u(2).u(7),
                Item::new(RANGE_END).u(4).u(0),
            ]);
            let map = map_with(&["x", "a", "b"], &encoded);
            let info = lax(&map);
            let range = info.range(info.ranges()[0]);
            assert_eq!(
                range.values[0],
                Binding::SubRanges(vec![
                    sourcemap_scopes_codec::SubRangeBinding {
                        value: Some("a".to_string()),
                        from: Position::new(0, 0),
                        to: Position::new(2, 7),
                    },
                    sourcemap_scopes_codec::SubRangeBinding {
                        value: Some("b".to_string()),
                        from: Position::new(2, 7),
                        to: Position::new(4, 0),
                    },
                ])
            );
        }
    }

    mod index_map_tests {
        use super::*;

        fn section_map(start: (u32, u32), end: (u32, u32)) -> SourceMapJson {
            let mut builder = SafeScopeInfoBuilder::new();
            builder
                .add_null_scope()
                .unwrap()
                .start_range(start.0, start.1, RangeOptions::default())
                .unwrap()
                .end_range(end.0, end.1)
                .unwrap();
            encode(&builder.build().unwrap(), None).unwrap()
        }

        #[test]
        fn should_concatenate_sections_and_offset_their_ranges() {
            let index_map = SourceMapJson {
                sections: Some(vec![
                    SourceMapSection {
                        offset: Position::new(0, 0),
                        map: section_map((0, 0), (0, 10)),
                    },
                    SourceMapSection {
                        offset: Position::new(1, 42),
                        map: section_map((0, 5), (2, 10)),
                    },
                ]),
                ..SourceMapJson::default()
            };

            let info = lax(&index_map);
            assert_eq!(info.scopes(), &[None, None]);
            assert_eq!(info.ranges().len(), 2);

            let first = info.range(info.ranges()[0]);
            assert_eq!(first.start, Position::new(0, 0));
            assert_eq!(first.end, Position::new(0, 10));

            // Line zero of the section gains the column offset; later
            // lines only shift by lines.
            let second = info.range(info.ranges()[1]);
            assert_eq!(second.start, Position::new(1, 47));
            assert_eq!(second.end, Position::new(3, 10));
        }

        #[test]
        fn should_ignore_the_caller_offset_for_index_maps() {
            let index_map = SourceMapJson {
                sections: Some(vec![SourceMapSection {
                    offset: Position::new(0, 0),
                    map: section_map((0, 3), (0, 9)),
                }]),
                ..SourceMapJson::default()
            };
            let options = DecodeOptions {
                generated_offset: Some(Position::new(5, 5)),
                ..DecodeOptions::default()
            };
            let info = decode(&index_map, &options).unwrap();
            let range = info.range(info.ranges()[0]);
            assert_eq!(range.start, Position::new(0, 3));
        }

        #[test]
        fn should_apply_the_caller_offset_to_flat_maps() {
            let map = section_map((0, 3), (2, 9));
            let options = DecodeOptions {
                generated_offset: Some(Position::new(1, 42)),
                ..DecodeOptions::default()
            };
            let info = decode(&map, &options).unwrap();
            let range = info.range(info.ranges()[0]);
            assert_eq!(range.start, Position::new(1, 45));
            assert_eq!(range.end, Position::new(3, 9));
        }

        #[test]
        fn should_keep_call_sites_unshifted() {
            let mut builder = SafeScopeInfoBuilder::new();
            builder
                .start_scope(
                    0,
                    0,
                    ScopeOptions {
                        key: Some("f".to_string()),
                        ..ScopeOptions::default()
                    },
                )
                .unwrap()
                .end_scope(9, 0)
                .unwrap()
                .start_range(
                    0,
                    0,
                    RangeOptions {
                        scope_key: Some("f".to_string()),
                        call_site: Some(OriginalPosition::new(0, 7, 7)),
                        ..RangeOptions::default()
                    },
                )
                .unwrap()
                .end_range(0, 10)
                .unwrap();
            let map = encode(&builder.build().unwrap(), None).unwrap();

            let options = DecodeOptions {
                generated_offset: Some(Position::new(3, 0)),
                ..DecodeOptions::default()
            };
            let info = decode(&map, &options).unwrap();
            let range = info.range(info.ranges()[0]);
            assert_eq!(range.start, Position::new(3, 0));
            assert_eq!(range.call_site, Some(OriginalPosition::new(0, 7, 7)));
        }
    }
}
