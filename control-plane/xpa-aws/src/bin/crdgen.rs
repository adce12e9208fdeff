use kube::core::CustomResourceExt;
use xpa_aws::crd::bucket::Bucket;
use xpa_aws::crd::bucket_policy::BucketPolicy;
use xpa_aws::crd::db_instance::RDSInstance;
use xpa_aws::crd::db_subnet_group::DBSubnetGroup;
use xpa_aws::crd::object::Object;
use xpa_aws::crd::provider_config::ProviderConfig;

fn main() {
    let crds = [
        ProviderConfig::crd(),
        RDSInstance::crd(),
        DBSubnetGroup::crd(),
        Bucket::crd(),
        BucketPolicy::crd(),
        Object::crd(),
    ];
    for crd in crds {
        let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
        println!("---\n{}", yaml);
    }
}
