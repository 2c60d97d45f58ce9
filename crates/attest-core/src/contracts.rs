//! ABI bindings for the on-chain contracts the import pipeline reads.

alloy::sol! {
    struct SchemaRecord {
        bytes32 uid;
        address resolver;
        bool revocable;
        string schema;
    }

    interface ISchemaRegistry {
        function getSchema(bytes32 uid) external view returns (SchemaRecord memory);
    }

    interface IKeyResolver {
        function validateSignature(bytes32 rootKeyUID, address signer) external view returns (bool);
    }
}
